//! Activation records and the activation decision.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Default number of machines one key may be activated on.
pub const DEFAULT_MAX_ACTIVATIONS: u32 = 2;

/// One machine bound to a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    /// Opaque machine identifier supplied by the client.
    pub machine_id: String,
    /// When the machine was first bound.
    pub activated_at: DateTime<Utc>,
    /// Client application version, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Client OS version, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

/// All activations recorded for one key.
///
/// `activations.len() <= max_activations` and machine ids are unique; the
/// only way to add a record is [`KeyActivationSet::try_push`], which
/// enforces both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyActivationSet {
    pub key_id: String,
    pub owner_id: i64,
    pub max_activations: u32,
    activations: Vec<ActivationRecord>,
    /// Store version this set was read at; 0 for a set not yet persisted.
    pub version: u64,
}

impl KeyActivationSet {
    /// Creates an empty, unpersisted set.
    #[must_use]
    pub fn new(key_id: impl Into<String>, owner_id: i64, max_activations: u32) -> Self {
        Self {
            key_id: key_id.into(),
            owner_id,
            max_activations,
            activations: Vec::new(),
            version: 0,
        }
    }

    /// Rebuilds a set read from storage, checking its invariants.
    pub(crate) fn from_stored(
        key_id: String,
        owner_id: i64,
        max_activations: u32,
        activations: Vec<ActivationRecord>,
        version: u64,
    ) -> StoreResult<Self> {
        let mut set = Self::new(key_id, owner_id, max_activations);
        set.version = version;
        for record in activations {
            let machine_id = record.machine_id.clone();
            if !set.try_push(record) {
                return Err(StoreError::Corrupt {
                    key_id: set.key_id,
                    detail: format!(
                        "record for machine {machine_id} is a duplicate or exceeds {max_activations} slots"
                    ),
                });
            }
        }
        Ok(set)
    }

    /// Returns the activation records in activation order.
    #[must_use]
    pub fn activations(&self) -> &[ActivationRecord] {
        &self.activations
    }

    /// Number of bound machines.
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::try_from(self.activations.len()).unwrap_or(u32::MAX)
    }

    /// Returns true if `machine_id` is bound to this key.
    #[must_use]
    pub fn contains(&self, machine_id: &str) -> bool {
        self.activations.iter().any(|a| a.machine_id == machine_id)
    }

    /// Returns true if every slot is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() >= self.max_activations
    }

    /// Free slots left on this key.
    #[must_use]
    pub fn remaining_slots(&self) -> u32 {
        self.max_activations.saturating_sub(self.count())
    }

    /// Decides whether `machine_id` may be activated on this key.
    ///
    /// A bound machine is always allowed, even on a full key.
    #[must_use]
    pub fn check(&self, machine_id: &str) -> ActivationCheck {
        if self.contains(machine_id) {
            ActivationCheck::allow(ActivationReason::AlreadyActivated)
        } else if self.is_full() {
            ActivationCheck::deny(self.max_activations)
        } else {
            ActivationCheck::allow(ActivationReason::NewMachine)
        }
    }

    /// Appends a record. Returns false, leaving the set untouched, if the
    /// machine is already bound or the key is full.
    pub fn try_push(&mut self, record: ActivationRecord) -> bool {
        if self.contains(&record.machine_id) || self.is_full() {
            return false;
        }
        self.activations.push(record);
        true
    }

    /// Removes `machine_id`. Returns whether a record was removed.
    pub fn remove(&mut self, machine_id: &str) -> bool {
        let before = self.activations.len();
        self.activations.retain(|a| a.machine_id != machine_id);
        self.activations.len() < before
    }
}

/// Decides whether `machine_id` may be activated on a key that may not have
/// been seen yet.
#[must_use]
pub fn decide(set: Option<&KeyActivationSet>, machine_id: &str) -> ActivationCheck {
    match set {
        None => ActivationCheck::allow(ActivationReason::FirstActivation),
        Some(set) => set.check(machine_id),
    }
}

/// Why an activation was allowed or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationReason {
    /// No record exists for the key yet.
    FirstActivation,
    /// The machine is already bound; no slot is consumed.
    AlreadyActivated,
    /// A free slot is available for a new machine.
    NewMachine,
    /// All slots are taken by other machines.
    LimitReached { max: u32 },
}

impl fmt::Display for ActivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstActivation => f.write_str("first_activation"),
            Self::AlreadyActivated => f.write_str("already_activated"),
            Self::NewMachine => f.write_str("new_machine"),
            Self::LimitReached { max } => write!(f, "limit_reached:{max}"),
        }
    }
}

/// Result of [`ActivationLedger::can_activate`](crate::ActivationLedger::can_activate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationCheck {
    pub allowed: bool,
    pub reason: ActivationReason,
}

impl ActivationCheck {
    fn allow(reason: ActivationReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(max: u32) -> Self {
        Self {
            allowed: false,
            reason: ActivationReason::LimitReached { max },
        }
    }
}

/// Successful result of recording an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// A new record was persisted; `count` of `max` slots now used.
    Activated { count: u32, max: u32 },
    /// The machine was already bound; nothing changed.
    AlreadyActivated,
}

impl fmt::Display for ActivationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activated { count, max } => write!(f, "activated:{count}/{max}"),
            Self::AlreadyActivated => f.write_str("already_activated"),
        }
    }
}

/// An activation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub key_id: String,
    pub owner_id: i64,
    pub machine_id: String,
    pub app_version: Option<String>,
    pub os_version: Option<String>,
}

impl ActivationRequest {
    /// Creates a request with no version metadata.
    #[must_use]
    pub fn new(key_id: impl Into<String>, owner_id: i64, machine_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            owner_id,
            machine_id: machine_id.into(),
            app_version: None,
            os_version: None,
        }
    }

    /// Sets the reported app version.
    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Sets the reported OS version.
    #[must_use]
    pub fn with_os_version(mut self, version: impl Into<String>) -> Self {
        self.os_version = Some(version.into());
        self
    }
}

/// Aggregate ledger statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationStats {
    pub total_keys: u64,
    pub total_activations: u64,
    pub keys_at_limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(machine_id: &str) -> ActivationRecord {
        ActivationRecord {
            machine_id: machine_id.to_string(),
            activated_at: Utc::now(),
            app_version: None,
            os_version: None,
        }
    }

    #[test]
    fn unseen_key_is_first_activation() {
        let check = decide(None, "m1");
        assert!(check.allowed);
        assert_eq!(check.reason.to_string(), "first_activation");
    }

    #[test]
    fn bound_machine_allowed_on_full_key() {
        let mut set = KeyActivationSet::new("k", 1, 2);
        assert!(set.try_push(record("a")));
        assert!(set.try_push(record("b")));
        assert!(set.is_full());

        let check = set.check("a");
        assert!(check.allowed);
        assert_eq!(check.reason, ActivationReason::AlreadyActivated);

        let check = set.check("c");
        assert!(!check.allowed);
        assert_eq!(check.reason.to_string(), "limit_reached:2");
    }

    #[test]
    fn try_push_enforces_invariants() {
        let mut set = KeyActivationSet::new("k", 1, 1);
        assert!(set.try_push(record("a")));
        assert!(!set.try_push(record("a")));
        assert!(!set.try_push(record("b")));
        assert_eq!(set.count(), 1);
        assert_eq!(set.remaining_slots(), 0);
    }

    #[test]
    fn remove_frees_slot() {
        let mut set = KeyActivationSet::new("k", 1, 1);
        set.try_push(record("a"));
        assert!(!set.remove("zzz"));
        assert!(set.remove("a"));
        assert_eq!(set.check("b").reason, ActivationReason::NewMachine);
    }

    #[test]
    fn from_stored_rejects_overfull() {
        let stored = vec![record("a"), record("b"), record("c")];
        assert!(matches!(
            KeyActivationSet::from_stored("k".into(), 1, 2, stored, 3),
            Err(StoreError::Corrupt { key_id, detail }) if key_id == "k" && detail.contains("machine c")
        ));
    }

    #[test]
    fn from_stored_rejects_duplicates() {
        let stored = vec![record("a"), record("a")];
        assert!(matches!(
            KeyActivationSet::from_stored("k".into(), 1, 5, stored, 1),
            Err(StoreError::Corrupt { key_id, .. }) if key_id == "k"
        ));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(
            ActivationOutcome::Activated { count: 1, max: 2 }.to_string(),
            "activated:1/2"
        );
        assert_eq!(
            ActivationOutcome::AlreadyActivated.to_string(),
            "already_activated"
        );
    }
}
