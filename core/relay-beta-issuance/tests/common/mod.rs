//! Shared test helpers for issuance tests.

#![allow(dead_code)]

use relay_beta_issuance::{IssuancePolicy, IssuanceSettings, SqliteTokenRegistry, TokenRegistry};
use relay_beta_license::{SigningKey, VerifyingKey};
use tempfile::TempDir;

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::from_bytes(&[7u8; 32]);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Settings with the given issuance cap and otherwise default values.
pub fn settings(max_beta_users: u64) -> IssuanceSettings {
    IssuanceSettings {
        max_beta_users,
        ..IssuanceSettings::default()
    }
}

/// A policy over `registry` signing with [`test_keypair`].
pub fn policy<R: TokenRegistry>(registry: R, max_beta_users: u64) -> IssuancePolicy<R> {
    let (signing_key, _) = test_keypair();
    IssuancePolicy::new(registry, Some(signing_key), settings(max_beta_users))
}

/// Creates a registry database path inside a fresh temporary directory.
pub fn temp_db() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    (dir, path)
}

/// Opens a SQLite registry on a fresh temporary file.
pub fn sqlite_registry() -> (TempDir, SqliteTokenRegistry) {
    let (dir, path) = temp_db();
    let registry = SqliteTokenRegistry::open(&path).unwrap();
    (dir, registry)
}
