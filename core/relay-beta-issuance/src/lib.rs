//! Beta token issuance.
//!
//! An owner asking for a beta token gets, in order of precedence:
//!
//! 1. the token already issued to them, byte-for-byte unchanged
//! 2. nothing, if the issuance cap is reached
//! 3. a freshly signed token
//!
//! The owner check, the cap check, the insert and the counter bump are one
//! atomic step in the [`TokenRegistry`], so concurrent requests never push
//! the issued-count past the cap or hand one owner two tokens.

mod error;
mod policy;
mod record;
mod registry;

pub use error::{IssuanceError, IssuanceResult, RegistryError, RegistryResult};
pub use policy::{
    DEFAULT_COHORT, DEFAULT_MAX_BETA_USERS, DEFAULT_VALIDITY_DAYS, IssuanceOutcome,
    IssuancePolicy, IssuanceSettings, IssuanceStats,
};
pub use record::IssuedToken;
pub use registry::{MemoryTokenRegistry, SaveIssued, SqliteTokenRegistry, TokenRegistry};
