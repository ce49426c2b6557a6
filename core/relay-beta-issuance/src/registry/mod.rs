//! Persistence for issued tokens and the global issued-count.

mod memory;
mod sqlite;

pub use memory::MemoryTokenRegistry;
pub use sqlite::SqliteTokenRegistry;

use crate::error::RegistryResult;
use crate::record::IssuedToken;

/// Result of [`TokenRegistry::save_issued_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveIssued {
    /// Stored; the issued-count is now `issued_count`.
    Saved { issued_count: u64 },
    /// The owner already holds a token. Nothing was written.
    AlreadyIssued(IssuedToken),
    /// The issued-count has reached the cap. Nothing was written.
    CapReached { issued_count: u64 },
}

/// Storage backend for issued tokens.
pub trait TokenRegistry: Send + Sync {
    /// Loads the token previously issued to `owner_id`.
    fn load_issued_token(&self, owner_id: i64) -> RegistryResult<Option<IssuedToken>>;

    /// Stores `token` and increments the issued-count as one atomic step,
    /// provided the owner holds no token yet and the count is below `cap`.
    fn save_issued_token(&self, token: &IssuedToken, cap: u64) -> RegistryResult<SaveIssued>;

    /// Number of tokens issued so far.
    fn issued_count(&self) -> RegistryResult<u64>;
}

impl<R: TokenRegistry + ?Sized> TokenRegistry for std::sync::Arc<R> {
    fn load_issued_token(&self, owner_id: i64) -> RegistryResult<Option<IssuedToken>> {
        (**self).load_issued_token(owner_id)
    }

    fn save_issued_token(&self, token: &IssuedToken, cap: u64) -> RegistryResult<SaveIssued> {
        (**self).save_issued_token(token, cap)
    }

    fn issued_count(&self) -> RegistryResult<u64> {
        (**self).issued_count()
    }
}
