//! Signed beta license tokens.
//!
//! This crate handles:
//! - Canonical encoding of the license envelope
//! - Issuance: building, signing and encoding a token
//! - Offline verification against an Ed25519 public key
//! - Deterministic discount codes and activation key identifiers
//!
//! # Token Format
//!
//! ```text
//! RELAY-BETA-<base64(envelope_json)>.<base64(signature)>
//! ```
//!
//! The envelope JSON uses short keys (`u`, `n`, `s`, `x`, `c`, `d`, `k`) and
//! the Ed25519 signature covers the exact JSON bytes carried in the token.
//!
//! # Usage
//!
//! ```rust
//! use relay_beta_license::{issue, verify, IssueRequest, KeyPair};
//!
//! let keys = KeyPair::generate();
//! let token = issue(
//!     IssueRequest { owner_id: 42, display_name: "alice", validity_days: 7, cohort: "beta-jan-2026" },
//!     Some(&keys.signing_key),
//! )
//! .unwrap();
//!
//! let envelope = verify(&token.encode(), &keys.verifying_key).unwrap();
//! assert_eq!(envelope.owner_id, 42);
//! ```

mod envelope;
mod error;
mod keys;
mod signer;
mod token;
mod verifier;

pub use envelope::{
    ANONYMOUS, DISCOUNT_PREFIX, EnvelopeStatus, LicenseEnvelope, SECS_PER_DAY, decode_envelope,
    discount_code, encode_envelope, key_id,
};
pub use error::{LicenseError, LicenseResult};
pub use keys::{KeyPair, SigningKey, VerifyingKey};
pub use signer::{IssueRequest, build_envelope, issue, issue_at, sign_envelope};
pub use token::{SEPARATOR, SignedToken, TOKEN_PREFIX};
pub use verifier::verify;
