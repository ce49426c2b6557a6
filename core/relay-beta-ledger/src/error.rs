//! Error types for the activation ledger.

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Every device slot on the key is taken by other machines.
    ///
    /// A normal business outcome, not a fault.
    #[error("activation limit reached ({max}/{max} machines)")]
    LimitReached { max: u32 },

    /// The store failed. Never swallowed.
    #[error("activation store error: {0}")]
    Store(#[from] StoreError),

    /// Concurrent writers kept winning the compare-and-swap on this key.
    #[error("too much contention on key {key_id}")]
    Contention { key_id: String },
}

/// Errors raised by an [`ActivationStore`](crate::ActivationStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data violates a ledger invariant.
    #[error("corrupt activation record for {key_id}: {detail}")]
    Corrupt { key_id: String, detail: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
