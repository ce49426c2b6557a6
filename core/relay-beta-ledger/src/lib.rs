//! Machine activation ledger for beta license keys.
//!
//! Each license token carries a key identifier. The ledger binds that key to
//! at most `max_activations` distinct machines:
//!
//! - **Unseen**: no record, the first machine is always accepted
//! - **Active**: some slots used, new machines are accepted
//! - **Full**: new machines are refused with `limit_reached:{max}`
//!
//! A machine that is already bound is accepted again in every state without
//! consuming a slot. Deactivating a machine frees its slot.
//!
//! # Concurrency
//!
//! Check-then-write runs as an optimistic transaction scoped to one key:
//! the set is read with its version, the decision is made, and the write
//! only lands if the version is unchanged. Losers re-read and re-decide.

mod error;
mod ledger;
mod model;
mod store;

pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use ledger::{ActivationLedger, MAX_CAS_RETRIES};
pub use model::{
    ActivationCheck, ActivationOutcome, ActivationReason, ActivationRecord, ActivationRequest,
    ActivationStats, DEFAULT_MAX_ACTIVATIONS, KeyActivationSet, decide,
};
pub use store::{ActivationStore, MemoryActivationStore, SaveOutcome, SqliteActivationStore};
