//! In-process token registry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{SaveIssued, TokenRegistry};
use crate::error::{RegistryError, RegistryResult};
use crate::record::IssuedToken;

#[derive(Debug, Default)]
struct Inner {
    tokens: HashMap<i64, IssuedToken>,
    issued: u64,
}

/// Token registry held in memory. Used in tests and single-process tools.
#[derive(Debug, Default)]
pub struct MemoryTokenRegistry {
    inner: Mutex<Inner>,
}

impl MemoryTokenRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> RegistryResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| RegistryError::Database("registry lock poisoned".to_string()))
    }
}

impl TokenRegistry for MemoryTokenRegistry {
    fn load_issued_token(&self, owner_id: i64) -> RegistryResult<Option<IssuedToken>> {
        Ok(self.inner()?.tokens.get(&owner_id).cloned())
    }

    fn save_issued_token(&self, token: &IssuedToken, cap: u64) -> RegistryResult<SaveIssued> {
        let mut inner = self.inner()?;
        if let Some(existing) = inner.tokens.get(&token.owner_id()) {
            return Ok(SaveIssued::AlreadyIssued(existing.clone()));
        }
        if inner.issued >= cap {
            return Ok(SaveIssued::CapReached {
                issued_count: inner.issued,
            });
        }
        inner.tokens.insert(token.owner_id(), token.clone());
        inner.issued += 1;
        Ok(SaveIssued::Saved {
            issued_count: inner.issued,
        })
    }

    fn issued_count(&self) -> RegistryResult<u64> {
        Ok(self.inner()?.issued)
    }
}
