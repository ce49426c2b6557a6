//! Error types for issuance.

use relay_beta_license::LicenseError;
use thiserror::Error;

/// Result type for issuance operations.
pub type IssuanceResult<T> = Result<T, IssuanceError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced by the issuance policy.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// No signing key is configured. Fatal; report to the operator.
    #[error("issuance is not configured: signing key missing")]
    NotConfigured,

    /// Building or signing the token failed.
    #[error("license error: {0}")]
    License(LicenseError),

    /// The registry failed. Never swallowed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<LicenseError> for IssuanceError {
    fn from(e: LicenseError) -> Self {
        match e {
            LicenseError::NotConfigured => Self::NotConfigured,
            other => Self::License(other),
        }
    }
}

/// Errors raised by a [`TokenRegistry`](crate::TokenRegistry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// A stored token could not be read back.
    #[error("corrupt issued token for owner {owner_id}: {detail}")]
    Corrupt { owner_id: i64, detail: String },

    /// The stored issued-count is out of range.
    #[error("corrupt issued count: {0}")]
    CorruptCount(i64),
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
