//! Activation decisions and mutations over an [`ActivationStore`].

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::model::{
    ActivationCheck, ActivationOutcome, ActivationReason, ActivationRecord, ActivationRequest,
    ActivationStats, DEFAULT_MAX_ACTIVATIONS, KeyActivationSet, decide,
};
use crate::store::{ActivationStore, SaveOutcome};

/// Compare-and-swap attempts per operation before giving up.
pub const MAX_CAS_RETRIES: usize = 16;

/// Per-key machine activation ledger.
///
/// Holds no ledger state of its own: every call reads the store fresh and
/// writes through with a version check, so racing writers on one key never
/// push it past its device cap.
pub struct ActivationLedger<S> {
    store: S,
    max_activations: u32,
}

impl<S: ActivationStore> ActivationLedger<S> {
    /// Creates a ledger with the default device cap.
    pub fn new(store: S) -> Self {
        Self::with_max_activations(store, DEFAULT_MAX_ACTIVATIONS)
    }

    /// Creates a ledger whose new keys allow `max_activations` machines.
    ///
    /// Keys already in the store keep the cap they were created with.
    pub fn with_max_activations(store: S, max_activations: u32) -> Self {
        Self {
            store,
            max_activations: max_activations.max(1),
        }
    }

    /// Device cap applied to keys seen for the first time.
    #[must_use]
    pub fn max_activations(&self) -> u32 {
        self.max_activations
    }

    /// Reports whether `machine_id` could be activated on `key_id` now.
    ///
    /// Advisory only: [`record_activation`](Self::record_activation)
    /// re-evaluates inside its own transaction.
    pub fn can_activate(&self, key_id: &str, machine_id: &str) -> LedgerResult<ActivationCheck> {
        let set = self.store.load_activation_set(key_id)?;
        Ok(decide(set.as_ref(), machine_id))
    }

    /// Binds a machine to a key, consuming a slot unless it is already bound.
    ///
    /// # Errors
    ///
    /// `LimitReached` when every slot is held by other machines (nothing is
    /// written), `Store` on backend failure, `Contention` if the per-key
    /// compare-and-swap keeps losing.
    pub fn record_activation(&self, request: ActivationRequest) -> LedgerResult<ActivationOutcome> {
        for attempt in 0..MAX_CAS_RETRIES {
            let current = self.store.load_activation_set(&request.key_id)?;
            let check = decide(current.as_ref(), &request.machine_id);

            match check.reason {
                ActivationReason::LimitReached { max } => {
                    info!(
                        "Activation denied for key {} on machine {}: limit_reached:{}",
                        request.key_id, request.machine_id, max
                    );
                    return Err(LedgerError::LimitReached { max });
                }
                ActivationReason::AlreadyActivated => {
                    debug!(
                        "Machine {} already activated on key {}",
                        request.machine_id, request.key_id
                    );
                    return Ok(ActivationOutcome::AlreadyActivated);
                }
                ActivationReason::FirstActivation | ActivationReason::NewMachine => {}
            }

            let (mut set, expected_version) = match current {
                Some(set) => {
                    let version = set.version;
                    (set, Some(version))
                }
                None => (
                    KeyActivationSet::new(
                        request.key_id.clone(),
                        request.owner_id,
                        self.max_activations,
                    ),
                    None,
                ),
            };

            let record = ActivationRecord {
                machine_id: request.machine_id.clone(),
                activated_at: Utc::now(),
                app_version: request.app_version.clone(),
                os_version: request.os_version.clone(),
            };
            if !set.try_push(record) {
                return Err(LedgerError::LimitReached {
                    max: set.max_activations,
                });
            }

            match self.store.save_activation_set(&set, expected_version)? {
                SaveOutcome::Saved { .. } => {
                    let outcome = ActivationOutcome::Activated {
                        count: set.count(),
                        max: set.max_activations,
                    };
                    info!(
                        "Activated key {} on machine {} ({}, {})",
                        request.key_id, request.machine_id, check.reason, outcome
                    );
                    return Ok(outcome);
                }
                SaveOutcome::Conflict => {
                    debug!(
                        "Activation write conflict on key {} (attempt {})",
                        request.key_id,
                        attempt + 1
                    );
                }
            }
        }

        warn!(
            "Giving up activation on key {} after {} conflicts",
            request.key_id, MAX_CAS_RETRIES
        );
        Err(LedgerError::Contention {
            key_id: request.key_id,
        })
    }

    /// Unbinds a machine from a key, freeing its slot.
    ///
    /// Returns whether a record was removed.
    pub fn deactivate_machine(&self, key_id: &str, machine_id: &str) -> LedgerResult<bool> {
        for attempt in 0..MAX_CAS_RETRIES {
            let Some(mut set) = self.store.load_activation_set(key_id)? else {
                return Ok(false);
            };
            let version = set.version;
            if !set.remove(machine_id) {
                return Ok(false);
            }

            match self.store.save_activation_set(&set, Some(version))? {
                SaveOutcome::Saved { .. } => {
                    info!(
                        "Deactivated machine {} on key {} ({}/{} in use)",
                        machine_id,
                        key_id,
                        set.count(),
                        set.max_activations
                    );
                    return Ok(true);
                }
                SaveOutcome::Conflict => {
                    debug!(
                        "Deactivation write conflict on key {} (attempt {})",
                        key_id,
                        attempt + 1
                    );
                }
            }
        }

        warn!(
            "Giving up deactivation on key {} after {} conflicts",
            key_id, MAX_CAS_RETRIES
        );
        Err(LedgerError::Contention {
            key_id: key_id.to_string(),
        })
    }

    /// Returns the activation set for a key, if any machine was ever bound.
    pub fn get_key_activations(&self, key_id: &str) -> LedgerResult<Option<KeyActivationSet>> {
        Ok(self.store.load_activation_set(key_id)?)
    }

    /// Aggregates key, record and full-key counts across the ledger.
    pub fn get_activation_stats(&self) -> LedgerResult<ActivationStats> {
        let sets = self.store.list_activation_sets()?;
        let mut stats = ActivationStats::default();
        for set in &sets {
            stats.total_keys += 1;
            stats.total_activations += u64::from(set.count());
            if set.is_full() {
                stats.keys_at_limit += 1;
            }
        }
        Ok(stats)
    }
}
