//! Error types for license issuance and verification.

use thiserror::Error;

/// Licensing-specific errors.
///
/// Verification failures (`InvalidFormat`, `InvalidSignature`,
/// `InvalidPayload`) are expected outcomes that callers branch on.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Token string is malformed (prefix, separator or base64).
    #[error("invalid license token format: {0}")]
    InvalidFormat(String),

    /// Ed25519 signature verification failed.
    ///
    /// Covers a wrong public key, a tampered payload and a truncated
    /// signature alike.
    #[error("license token signature invalid")]
    InvalidSignature,

    /// Payload JSON is malformed or missing required fields.
    #[error("invalid license payload: {0}")]
    InvalidPayload(String),

    /// No signing key is available for issuance.
    #[error("license signing key not configured")]
    NotConfigured,

    /// Key material could not be parsed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The envelope could not be serialized for signing.
    #[error("license serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An issuance parameter is out of range.
    #[error("invalid issuance parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
