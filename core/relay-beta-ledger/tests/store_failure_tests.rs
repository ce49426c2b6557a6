//! Backend failures reach the caller and leave the ledger untouched.

mod common;

use std::sync::Arc;

use common::{KEY, request};
use relay_beta_ledger::{
    ActivationLedger, ActivationStore, KeyActivationSet, LedgerError, MemoryActivationStore,
    SaveOutcome, StoreError, StoreResult,
};

/// Store over a shared memory store whose selected calls fail.
#[derive(Default)]
struct FailingStore {
    inner: Arc<MemoryActivationStore>,
    fail_loads: bool,
    fail_saves: bool,
    fail_lists: bool,
}

fn unavailable() -> StoreError {
    StoreError::Database("disk unavailable".to_string())
}

impl ActivationStore for FailingStore {
    fn load_activation_set(&self, key_id: &str) -> StoreResult<Option<KeyActivationSet>> {
        if self.fail_loads {
            return Err(unavailable());
        }
        self.inner.load_activation_set(key_id)
    }

    fn save_activation_set(
        &self,
        set: &KeyActivationSet,
        expected_version: Option<u64>,
    ) -> StoreResult<SaveOutcome> {
        if self.fail_saves {
            return Err(unavailable());
        }
        self.inner.save_activation_set(set, expected_version)
    }

    fn list_activation_sets(&self) -> StoreResult<Vec<KeyActivationSet>> {
        if self.fail_lists {
            return Err(unavailable());
        }
        self.inner.list_activation_sets()
    }
}

fn is_store_error<T: std::fmt::Debug>(result: Result<T, LedgerError>) -> bool {
    matches!(result, Err(LedgerError::Store(StoreError::Database(_))))
}

#[test]
fn failed_load_stops_activation() {
    let store = FailingStore {
        fail_loads: true,
        ..FailingStore::default()
    };
    let inner = Arc::clone(&store.inner);
    let ledger = ActivationLedger::new(store);

    assert!(is_store_error(ledger.can_activate(KEY, "A")));
    assert!(is_store_error(ledger.record_activation(request("A"))));
    assert!(inner.load_activation_set(KEY).unwrap().is_none());
}

#[test]
fn failed_save_writes_nothing() {
    let store = FailingStore {
        fail_saves: true,
        ..FailingStore::default()
    };
    let inner = Arc::clone(&store.inner);
    let ledger = ActivationLedger::new(store);

    assert!(is_store_error(ledger.record_activation(request("A"))));
    assert!(inner.load_activation_set(KEY).unwrap().is_none());
}

#[test]
fn failed_save_keeps_machine_bound() {
    let inner = Arc::new(MemoryActivationStore::new());
    ActivationLedger::new(Arc::clone(&inner))
        .record_activation(request("A"))
        .unwrap();

    let ledger = ActivationLedger::new(FailingStore {
        inner: Arc::clone(&inner),
        fail_saves: true,
        ..FailingStore::default()
    });
    assert!(is_store_error(ledger.deactivate_machine(KEY, "A")));

    let set = inner.load_activation_set(KEY).unwrap().unwrap();
    assert!(set.contains("A"));
    assert_eq!(set.version, 1);
}

#[test]
fn failed_list_stops_stats() {
    let ledger = ActivationLedger::new(FailingStore {
        fail_lists: true,
        ..FailingStore::default()
    });
    assert!(is_store_error(ledger.get_activation_stats()));
}
