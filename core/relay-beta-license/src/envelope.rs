//! The signed claim set carried inside a beta token, and its canonical
//! byte encoding.
//!
//! The encoding is compact JSON with short keys in a fixed order:
//!
//! ```text
//! {"u":42,"n":"alice","s":1767225600,"x":1767830400,"c":"beta-jan-2026","d":"BETA1A2B3C4D","k":"0f1e2d3c4b5a6978"}
//! ```
//!
//! The signature covers these exact bytes. Verification parses the envelope
//! from the signed bytes and never re-serializes it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LicenseError, LicenseResult};

/// Seconds in one validity day.
pub const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Display name used when the owner has none.
pub const ANONYMOUS: &str = "anonymous";

/// Tag prepended to every discount code.
pub const DISCOUNT_PREFIX: &str = "BETA";

const DISCOUNT_DOMAIN: &str = "relay-beta";
const KEY_ID_DOMAIN: &str = "relay";
const DISCOUNT_DIGEST_LEN: usize = 8;
const KEY_ID_LEN: usize = 16;

/// The decoded license payload.
///
/// Field order here is the wire order; serde emits struct fields in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseEnvelope {
    /// Stable identifier of the owning user.
    #[serde(rename = "u")]
    pub owner_id: i64,
    /// Owner display name.
    #[serde(rename = "n")]
    pub display_name: String,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(rename = "s")]
    pub issued_at: i64,
    /// Expiration timestamp (seconds since epoch).
    #[serde(rename = "x")]
    pub expires_at: i64,
    /// Beta cohort tag.
    #[serde(rename = "c")]
    pub cohort: String,
    /// Discount code, stable per owner.
    #[serde(rename = "d")]
    pub discount_code: String,
    /// Identifier of the activation ledger entry for this token.
    #[serde(rename = "k")]
    pub key_id: String,
}

/// Expiry status of an envelope at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    /// Not yet expired.
    Active {
        /// Seconds until expiry.
        remaining_secs: i64,
    },
    /// `now` is at or past `expires_at`.
    Expired,
}

impl LicenseEnvelope {
    /// Returns the status of this envelope at `now` (seconds since epoch).
    #[must_use]
    pub fn status_at(&self, now: i64) -> EnvelopeStatus {
        if now < self.expires_at {
            EnvelopeStatus::Active {
                remaining_secs: self.expires_at - now,
            }
        } else {
            EnvelopeStatus::Expired
        }
    }

    /// Returns the status of this envelope against the wall clock.
    #[must_use]
    pub fn status(&self) -> EnvelopeStatus {
        self.status_at(chrono::Utc::now().timestamp())
    }

    /// Returns true if the envelope has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.status_at(now), EnvelopeStatus::Expired)
    }
}

/// Serializes an envelope to its canonical bytes.
pub fn encode_envelope(envelope: &LicenseEnvelope) -> LicenseResult<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Parses canonical envelope bytes.
///
/// Rejects unknown keys, missing keys, wrong value types and an expiry that
/// does not follow issuance.
pub fn decode_envelope(bytes: &[u8]) -> LicenseResult<LicenseEnvelope> {
    let envelope: LicenseEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| LicenseError::InvalidPayload(format!("invalid payload JSON: {e}")))?;

    if envelope.expires_at <= envelope.issued_at {
        return Err(LicenseError::InvalidPayload(format!(
            "expiry {} does not follow issuance {}",
            envelope.expires_at, envelope.issued_at
        )));
    }

    Ok(envelope)
}

/// Derives the discount code for an owner.
///
/// Depends on `owner_id` alone, so re-issuance yields the same code.
#[must_use]
pub fn discount_code(owner_id: i64) -> String {
    let digest = Sha256::digest(format!("{DISCOUNT_DOMAIN}-{owner_id}").as_bytes());
    let hex = hex::encode(digest);
    format!(
        "{DISCOUNT_PREFIX}{}",
        hex[..DISCOUNT_DIGEST_LEN].to_ascii_uppercase()
    )
}

/// Derives the activation key identifier for one issuance event.
///
/// Two issuances for the same owner within the same second produce the same
/// identifier.
#[must_use]
pub fn key_id(owner_id: i64, issued_at: i64) -> String {
    let digest = Sha256::digest(format!("{owner_id}-{issued_at}-{KEY_ID_DOMAIN}").as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(KEY_ID_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LicenseEnvelope {
        LicenseEnvelope {
            owner_id: 42,
            display_name: "alice".to_string(),
            issued_at: 1_767_225_600,
            expires_at: 1_767_830_400,
            cohort: "beta-jan-2026".to_string(),
            discount_code: discount_code(42),
            key_id: key_id(42, 1_767_225_600),
        }
    }

    #[test]
    fn encoding_is_compact_and_ordered() {
        let bytes = encode_envelope(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(r#"{"u":42,"n":"alice","s":1767225600,"x":1767830400,"c":"#));
        assert!(!text.contains(' '));
        let order: Vec<usize> = ["\"u\"", "\"n\"", "\"s\"", "\"x\"", "\"c\"", "\"d\"", "\"k\""]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn decode_reproduces_envelope() {
        let env = sample();
        assert_eq!(decode_envelope(&encode_envelope(&env).unwrap()).unwrap(), env);
    }

    #[test]
    fn decode_rejects_unknown_field() {
        let json = br#"{"u":1,"n":"a","s":1,"x":2,"c":"c","d":"d","k":"k","z":0}"#;
        assert!(matches!(
            decode_envelope(json),
            Err(LicenseError::InvalidPayload(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_key_id() {
        let json = br#"{"u":1,"n":"a","s":1,"x":2,"c":"c","d":"d"}"#;
        assert!(matches!(
            decode_envelope(json),
            Err(LicenseError::InvalidPayload(_))
        ));
    }

    #[test]
    fn decode_rejects_inverted_dates() {
        let json = br#"{"u":1,"n":"a","s":10,"x":10,"c":"c","d":"d","k":"k"}"#;
        assert!(matches!(
            decode_envelope(json),
            Err(LicenseError::InvalidPayload(_))
        ));
    }

    #[test]
    fn discount_code_shape() {
        let code = discount_code(42);
        assert_eq!(code.len(), DISCOUNT_PREFIX.len() + DISCOUNT_DIGEST_LEN);
        assert!(code.starts_with(DISCOUNT_PREFIX));
        assert!(code[DISCOUNT_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn key_id_depends_on_time() {
        assert_eq!(key_id(7, 100).len(), KEY_ID_LEN);
        assert_eq!(key_id(7, 100), key_id(7, 100));
        assert_ne!(key_id(7, 100), key_id(7, 101));
        assert_ne!(key_id(7, 100), key_id(8, 100));
    }

    #[test]
    fn status_transitions_at_expiry() {
        let env = sample();
        assert_eq!(
            env.status_at(env.expires_at - 10),
            EnvelopeStatus::Active { remaining_secs: 10 }
        );
        assert_eq!(env.status_at(env.expires_at), EnvelopeStatus::Expired);
        assert!(env.is_expired_at(env.expires_at + 1));
    }
}
