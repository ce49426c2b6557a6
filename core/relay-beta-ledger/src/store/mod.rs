//! Persistence for activation sets.
//!
//! A store only has to provide per-key compare-and-swap. The ledger builds
//! its check-then-write transaction on top of it, so no lock ever spans more
//! than one key.

mod memory;
mod sqlite;

pub use memory::MemoryActivationStore;
pub use sqlite::SqliteActivationStore;

use crate::error::StoreResult;
use crate::model::KeyActivationSet;

/// Result of a conditional save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The set was written and now has this version.
    Saved { version: u64 },
    /// Another writer changed the key since it was read.
    Conflict,
}

/// Storage backend for the activation ledger.
pub trait ActivationStore: Send + Sync {
    /// Loads the set for `key_id`, with its current version.
    fn load_activation_set(&self, key_id: &str) -> StoreResult<Option<KeyActivationSet>>;

    /// Writes `set` if the stored version still equals `expected_version`.
    ///
    /// `None` means the key must not exist yet. Must be atomic per key.
    fn save_activation_set(
        &self,
        set: &KeyActivationSet,
        expected_version: Option<u64>,
    ) -> StoreResult<SaveOutcome>;

    /// Loads every set, for statistics.
    fn list_activation_sets(&self) -> StoreResult<Vec<KeyActivationSet>>;
}

impl<S: ActivationStore + ?Sized> ActivationStore for std::sync::Arc<S> {
    fn load_activation_set(&self, key_id: &str) -> StoreResult<Option<KeyActivationSet>> {
        (**self).load_activation_set(key_id)
    }

    fn save_activation_set(
        &self,
        set: &KeyActivationSet,
        expected_version: Option<u64>,
    ) -> StoreResult<SaveOutcome> {
        (**self).save_activation_set(set, expected_version)
    }

    fn list_activation_sets(&self) -> StoreResult<Vec<KeyActivationSet>> {
        (**self).list_activation_sets()
    }
}
