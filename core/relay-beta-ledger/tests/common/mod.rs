//! Shared test helpers for ledger tests.

#![allow(dead_code)]

use relay_beta_ledger::{ActivationRequest, SqliteActivationStore};
use tempfile::TempDir;

/// Key id used by most scenarios.
pub const KEY: &str = "0f1e2d3c4b5a6978";

/// Owner id used by most scenarios.
pub const OWNER: i64 = 42;

/// Builds an activation request for `machine_id` on [`KEY`].
pub fn request(machine_id: &str) -> ActivationRequest {
    ActivationRequest::new(KEY, OWNER, machine_id)
}

/// Creates a database path inside a fresh temporary directory.
///
/// The directory must outlive every store opened on the path.
pub fn temp_db() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activations.db");
    (dir, path)
}

/// Opens a SQLite store on a fresh temporary file.
pub fn sqlite_store() -> (TempDir, SqliteActivationStore) {
    let (dir, path) = temp_db();
    let store = SqliteActivationStore::open(&path).unwrap();
    (dir, store)
}
