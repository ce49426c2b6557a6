//! Shared test helpers for CLI tests.

#![allow(dead_code)]

use relay_beta_cli::{Beta, BetaConfig};
use relay_beta_license::SigningKey;
use tempfile::TempDir;

/// Hex seed of the deterministic test signing key.
pub fn signing_hex() -> String {
    SigningKey::from_bytes(&[11u8; 32]).to_hex()
}

/// A config with the test signing key and a database in a fresh temp dir.
pub fn test_config() -> (TempDir, BetaConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = BetaConfig {
        signing_key: Some(signing_hex()),
        database: Some(dir.path().join("data").join("beta.db")),
        ..BetaConfig::default()
    };
    (dir, config)
}

/// Opens a [`Beta`] on a fresh database.
pub fn open_beta() -> (TempDir, Beta) {
    let (dir, config) = test_config();
    let beta = Beta::open(config).unwrap();
    (dir, beta)
}
