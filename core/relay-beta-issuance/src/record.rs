//! The registry's record of one issued token.

use relay_beta_license::{LicenseEnvelope, LicenseResult, SignedToken};
use serde::Serialize;

/// A token handed to an owner, together with its decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    token: SignedToken,
    envelope: LicenseEnvelope,
}

impl IssuedToken {
    /// Wraps a token freshly produced by the signer or read from storage.
    ///
    /// The envelope is parsed from the signed bytes without checking the
    /// signature; registries only hold tokens this service signed.
    pub fn new(token: SignedToken) -> LicenseResult<Self> {
        let envelope = token.envelope_unverified()?;
        Ok(Self { token, envelope })
    }

    /// Owner the token was issued to.
    #[must_use]
    pub fn owner_id(&self) -> i64 {
        self.envelope.owner_id
    }

    /// The signed token.
    #[must_use]
    pub fn token(&self) -> &SignedToken {
        &self.token
    }

    /// The textual token, exactly as first handed out.
    #[must_use]
    pub fn encoded(&self) -> String {
        self.token.encode()
    }

    /// The envelope carried by the token.
    #[must_use]
    pub fn envelope(&self) -> &LicenseEnvelope {
        &self.envelope
    }
}
