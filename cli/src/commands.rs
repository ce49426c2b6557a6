//! Operator commands over one SQLite database.

use std::fmt;
use std::fs;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use relay_beta_issuance::{
    IssuanceError, IssuanceOutcome, IssuancePolicy, IssuanceStats, IssuedToken,
    SqliteTokenRegistry,
};
use relay_beta_ledger::{
    ActivationLedger, ActivationOutcome, ActivationRequest, ActivationStats, LedgerError,
    SqliteActivationStore,
};
use relay_beta_license::{EnvelopeStatus, KeyPair, LicenseEnvelope, SECS_PER_DAY, verify};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{BetaConfig, ENV_PUBLIC_KEY, ENV_SIGNING_KEY};
use crate::machine::{MachineInfo, machine_fingerprint};

/// Output of a command: printable for humans, serializable for `--json`.
pub trait Report: Serialize + fmt::Display {
    /// Whether the command achieved what was asked. Drives the exit code.
    fn succeeded(&self) -> bool {
        true
    }
}

/// Issuance policy and activation ledger sharing one database file.
pub struct Beta {
    config: BetaConfig,
    policy: IssuancePolicy<SqliteTokenRegistry>,
    ledger: ActivationLedger<SqliteActivationStore>,
}

impl Beta {
    pub fn open(config: BetaConfig) -> Result<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
        debug!("Opening beta database at {:?}", path);

        let registry = SqliteTokenRegistry::open(&path)
            .with_context(|| format!("Failed to open token registry at {}", path.display()))?;
        let store = SqliteActivationStore::open(&path)
            .with_context(|| format!("Failed to open activation store at {}", path.display()))?;
        let signing_key = config.signing_key()?;

        Ok(Self {
            policy: IssuancePolicy::new(registry, signing_key, config.issuance_settings()),
            ledger: ActivationLedger::with_max_activations(store, config.max_activations),
            config,
        })
    }

    pub fn issue(&self, owner_id: i64, display_name: &str) -> Result<IssueReport> {
        let outcome = match self.policy.request_token(owner_id, display_name) {
            Ok(outcome) => outcome,
            Err(IssuanceError::NotConfigured) => {
                bail!("Cannot issue tokens: no signing key configured (set {ENV_SIGNING_KEY})")
            }
            Err(e) => return Err(e).context("Token issuance failed"),
        };
        Ok(match outcome {
            IssuanceOutcome::Issued { token, number } => IssueReport::Issued { number, token },
            IssuanceOutcome::AlreadyHave(token) => IssueReport::AlreadyHave { token },
            IssuanceOutcome::NoSlots => {
                let stats = self.policy.stats().context("Failed to read issuance stats")?;
                IssueReport::NoSlots {
                    issued: stats.issued,
                    cap: stats.cap,
                }
            }
        })
    }

    /// Checks a token offline against the configured public key.
    pub fn verify(&self, token: &str) -> Result<VerifyReport> {
        let verifying_key = self.config.verifying_key()?;
        Ok(match verify(token, &verifying_key) {
            Ok(envelope) => {
                let status = envelope.status();
                VerifyReport::Valid { envelope, status }
            }
            Err(e) => {
                info!("Token rejected: {}", e);
                VerifyReport::Invalid {
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Verifies `token`, refuses it if expired, then binds a machine to its
    /// key. Without `machine_id` the local machine fingerprint is used.
    pub fn activate(
        &self,
        token: &str,
        machine_id: Option<&str>,
        app_version: Option<&str>,
    ) -> Result<ActivateReport> {
        let envelope = match self.verify(token)? {
            VerifyReport::Valid {
                status: EnvelopeStatus::Expired,
                envelope,
            } => {
                return Ok(ActivateReport::Rejected {
                    reason: format!("token for key {} has expired", envelope.key_id),
                });
            }
            VerifyReport::Valid { envelope, .. } => envelope,
            VerifyReport::Invalid { reason } => return Ok(ActivateReport::Rejected { reason }),
        };

        let mut request = match machine_id {
            Some(machine_id) => {
                ActivationRequest::new(&envelope.key_id, envelope.owner_id, machine_id)
            }
            None => ActivationRequest::new(&envelope.key_id, envelope.owner_id, machine_fingerprint())
                .with_os_version(MachineInfo::collect().os_label()),
        };
        if let Some(version) = app_version {
            request = request.with_app_version(version);
        }
        let machine_id = request.machine_id.clone();

        let report = match self.ledger.record_activation(request) {
            Ok(ActivationOutcome::Activated { count, max }) => ActivateReport::Activated {
                key_id: envelope.key_id,
                machine_id,
                count,
                max,
            },
            Ok(ActivationOutcome::AlreadyActivated) => ActivateReport::AlreadyActivated {
                key_id: envelope.key_id,
                machine_id,
            },
            Err(LedgerError::LimitReached { max }) => ActivateReport::LimitReached {
                key_id: envelope.key_id,
                max,
            },
            Err(e) => return Err(e).context("Activation failed"),
        };
        Ok(report)
    }

    pub fn deactivate(&self, key_id: &str, machine_id: &str) -> Result<DeactivateReport> {
        let removed = self
            .ledger
            .deactivate_machine(key_id, machine_id)
            .context("Deactivation failed")?;
        Ok(DeactivateReport {
            key_id: key_id.to_string(),
            machine_id: machine_id.to_string(),
            removed,
        })
    }

    pub fn stats(&self) -> Result<StatsReport> {
        Ok(StatsReport {
            issuance: self.policy.stats().context("Failed to read issuance stats")?,
            activations: self
                .ledger
                .get_activation_stats()
                .context("Failed to read activation stats")?,
        })
    }
}

/// Generates a fresh signing key pair.
#[must_use]
pub fn keygen() -> KeygenReport {
    let keys = KeyPair::generate();
    KeygenReport {
        signing_key: keys.signing_key.to_hex(),
        public_key: keys.verifying_key.to_hex(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeygenReport {
    pub signing_key: String,
    pub public_key: String,
}

impl fmt::Display for KeygenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{ENV_SIGNING_KEY}={}", self.signing_key)?;
        write!(f, "{}={}", ENV_PUBLIC_KEY, self.public_key)
    }
}

impl Report for KeygenReport {}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueReport {
    Issued { number: u64, token: IssuedToken },
    AlreadyHave { token: IssuedToken },
    NoSlots { issued: u64, cap: u64 },
}

impl IssueReport {
    #[must_use]
    pub fn token(&self) -> Option<&IssuedToken> {
        match self {
            Self::Issued { token, .. } | Self::AlreadyHave { token } => Some(token),
            Self::NoSlots { .. } => None,
        }
    }
}

impl fmt::Display for IssueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issued { number, token } => {
                writeln!(f, "Issued beta key #{number}")?;
                write_token(f, token)
            }
            Self::AlreadyHave { token } => {
                writeln!(f, "Owner {} already has a beta key", token.owner_id())?;
                write_token(f, token)
            }
            Self::NoSlots { issued, cap } => write!(f, "No beta slots left ({issued}/{cap})"),
        }
    }
}

impl Report for IssueReport {
    fn succeeded(&self) -> bool {
        self.token().is_some()
    }
}

fn write_token(f: &mut fmt::Formatter<'_>, token: &IssuedToken) -> fmt::Result {
    let envelope = token.envelope();
    writeln!(f, "  key:      {}", envelope.key_id)?;
    writeln!(f, "  discount: {}", envelope.discount_code)?;
    writeln!(f, "  expires:  {}", timestamp(envelope.expires_at))?;
    write!(f, "{}", token.encoded())
}

/// Whole days remaining, rounding a partial day up.
fn days_left(remaining_secs: i64) -> i64 {
    remaining_secs / SECS_PER_DAY + i64::from(remaining_secs % SECS_PER_DAY != 0)
}

fn timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyReport {
    Valid {
        envelope: LicenseEnvelope,
        #[serde(rename = "expiry")]
        status: EnvelopeStatus,
    },
    Invalid {
        reason: String,
    },
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid { envelope, status } => {
                match status {
                    EnvelopeStatus::Active { remaining_secs } => writeln!(
                        f,
                        "Valid token, {} day(s) left",
                        days_left(*remaining_secs)
                    )?,
                    EnvelopeStatus::Expired => writeln!(f, "Valid signature, token expired")?,
                }
                writeln!(f, "  owner:    {} ({})", envelope.owner_id, envelope.display_name)?;
                writeln!(f, "  cohort:   {}", envelope.cohort)?;
                writeln!(f, "  key:      {}", envelope.key_id)?;
                writeln!(f, "  discount: {}", envelope.discount_code)?;
                writeln!(f, "  issued:   {}", timestamp(envelope.issued_at))?;
                write!(f, "  expires:  {}", timestamp(envelope.expires_at))
            }
            Self::Invalid { reason } => write!(f, "Invalid token: {reason}"),
        }
    }
}

impl Report for VerifyReport {
    fn succeeded(&self) -> bool {
        matches!(
            self,
            Self::Valid {
                status: EnvelopeStatus::Active { .. },
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivateReport {
    Activated {
        key_id: String,
        machine_id: String,
        count: u32,
        max: u32,
    },
    AlreadyActivated {
        key_id: String,
        machine_id: String,
    },
    LimitReached {
        key_id: String,
        max: u32,
    },
    Rejected {
        reason: String,
    },
}

impl fmt::Display for ActivateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activated {
                key_id,
                machine_id,
                count,
                max,
            } => write!(f, "activated:{count}/{max} (key {key_id}, machine {machine_id})"),
            Self::AlreadyActivated { key_id, machine_id } => {
                write!(f, "already_activated (key {key_id}, machine {machine_id})")
            }
            Self::LimitReached { key_id, max } => write!(f, "limit_reached:{max} (key {key_id})"),
            Self::Rejected { reason } => write!(f, "rejected: {reason}"),
        }
    }
}

impl Report for ActivateReport {
    fn succeeded(&self) -> bool {
        matches!(self, Self::Activated { .. } | Self::AlreadyActivated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeactivateReport {
    pub key_id: String,
    pub machine_id: String,
    pub removed: bool,
}

impl fmt::Display for DeactivateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removed {
            write!(f, "Deactivated machine {} on key {}", self.machine_id, self.key_id)
        } else {
            write!(f, "Machine {} was not active on key {}", self.machine_id, self.key_id)
        }
    }
}

impl Report for DeactivateReport {
    fn succeeded(&self) -> bool {
        self.removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub issuance: IssuanceStats,
    pub activations: ActivationStats,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Beta keys issued:   {}/{} ({} left)",
            self.issuance.issued, self.issuance.cap, self.issuance.slots_left
        )?;
        writeln!(f, "Activated keys:     {}", self.activations.total_keys)?;
        writeln!(f, "Machine bindings:   {}", self.activations.total_activations)?;
        write!(f, "Keys at limit:      {}", self.activations.keys_at_limit)
    }
}

impl Report for StatsReport {}
