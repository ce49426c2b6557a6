//! Shared test helpers for license tests.

#![allow(dead_code)]

use relay_beta_license::{IssueRequest, SignedToken, SigningKey, VerifyingKey, issue_at};

/// Unix time used as "now" by scenario tests (2026-01-01T00:00:00Z).
pub const T: i64 = 1_767_225_600;

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, VerifyingKey) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// A second, unrelated key pair.
pub fn other_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::from_bytes(&[9u8; 32]);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Issues a seven-day token for `owner_id` at time `T`.
pub fn token_for(signing_key: &SigningKey, owner_id: i64) -> SignedToken {
    issue_at(
        IssueRequest {
            owner_id,
            display_name: "alice",
            validity_days: 7,
            cohort: "beta-jan-2026",
        },
        Some(signing_key),
        T,
    )
    .unwrap()
}
