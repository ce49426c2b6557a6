//! Wire encoding of a signed envelope.
//!
//! ```text
//! RELAY-BETA-<base64(envelope_bytes)>.<base64(signature)>
//! ```
//!
//! Both halves use standard padded base64, whose alphabet never contains
//! the `.` separator.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::envelope::{LicenseEnvelope, decode_envelope};
use crate::error::{LicenseError, LicenseResult};

/// Literal prefix naming the token family.
pub const TOKEN_PREFIX: &str = "RELAY-BETA";

/// Separator between payload and signature.
pub const SEPARATOR: char = '.';

/// A signed envelope: the exact signed bytes plus their signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    envelope_bytes: Vec<u8>,
    signature: Vec<u8>,
}

impl SignedToken {
    /// Assembles a token from already-signed parts.
    #[must_use]
    pub fn from_parts(envelope_bytes: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            envelope_bytes,
            signature,
        }
    }

    /// Returns the signed message bytes.
    #[must_use]
    pub fn envelope_bytes(&self) -> &[u8] {
        &self.envelope_bytes
    }

    /// Returns the raw signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Parses the envelope out of the signed bytes without checking the
    /// signature. Only for tokens read back from a trusted store.
    pub fn envelope_unverified(&self) -> LicenseResult<LicenseEnvelope> {
        decode_envelope(&self.envelope_bytes)
    }

    /// Renders the textual token.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{TOKEN_PREFIX}-{}{SEPARATOR}{}",
            BASE64.encode(&self.envelope_bytes),
            BASE64.encode(&self.signature)
        )
    }

    /// Splits and base64-decodes a textual token. Performs no signature
    /// check.
    pub fn decode(token: &str) -> LicenseResult<Self> {
        let token = token.trim();
        let body = token
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or_else(|| LicenseError::InvalidFormat("missing RELAY-BETA- prefix".to_string()))?;

        if body.matches(SEPARATOR).count() != 1 {
            return Err(LicenseError::InvalidFormat(
                "expected exactly one '.' between payload and signature".to_string(),
            ));
        }
        let (payload_b64, signature_b64) = body.rsplit_once(SEPARATOR).ok_or_else(|| {
            LicenseError::InvalidFormat("missing payload/signature separator".to_string())
        })?;

        let envelope_bytes = BASE64
            .decode(payload_b64)
            .map_err(|e| LicenseError::InvalidFormat(format!("invalid payload base64: {e}")))?;
        let signature = BASE64
            .decode(signature_b64)
            .map_err(|e| LicenseError::InvalidFormat(format!("invalid signature base64: {e}")))?;

        Ok(Self {
            envelope_bytes,
            signature,
        })
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for SignedToken {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for SignedToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for SignedToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}
