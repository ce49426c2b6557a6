//! Operator tooling for Relay beta tokens.
//!
//! Wires [`BetaConfig`] to the issuance policy and the activation ledger,
//! both persisted in one SQLite database.

pub mod commands;
pub mod config;
pub mod machine;

pub use commands::{
    ActivateReport, Beta, DeactivateReport, IssueReport, KeygenReport, Report, StatsReport,
    VerifyReport, keygen,
};
pub use config::{BetaConfig, ConfigError, ConfigResult};
pub use machine::{MachineInfo, machine_fingerprint};
