//! In-process activation store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{ActivationStore, SaveOutcome};
use crate::error::{StoreError, StoreResult};
use crate::model::KeyActivationSet;

/// Activation store held in memory. Used in tests and single-process tools.
#[derive(Debug, Default)]
pub struct MemoryActivationStore {
    sets: Mutex<HashMap<String, KeyActivationSet>>,
}

impl MemoryActivationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sets(&self) -> StoreResult<MutexGuard<'_, HashMap<String, KeyActivationSet>>> {
        self.sets
            .lock()
            .map_err(|_| StoreError::Database("activation map lock poisoned".to_string()))
    }
}

impl ActivationStore for MemoryActivationStore {
    fn load_activation_set(&self, key_id: &str) -> StoreResult<Option<KeyActivationSet>> {
        Ok(self.sets()?.get(key_id).cloned())
    }

    fn save_activation_set(
        &self,
        set: &KeyActivationSet,
        expected_version: Option<u64>,
    ) -> StoreResult<SaveOutcome> {
        let mut sets = self.sets()?;
        let current = sets.get(&set.key_id).map(|s| s.version);
        if current != expected_version {
            return Ok(SaveOutcome::Conflict);
        }

        let version = expected_version.map_or(1, |v| v + 1);
        let mut stored = set.clone();
        stored.version = version;
        sets.insert(set.key_id.clone(), stored);
        Ok(SaveOutcome::Saved { version })
    }

    fn list_activation_sets(&self) -> StoreResult<Vec<KeyActivationSet>> {
        Ok(self.sets()?.values().cloned().collect())
    }
}
