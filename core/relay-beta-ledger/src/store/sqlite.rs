//! SQLite-backed activation store.
//!
//! Each key is one row carrying its activation records as a JSON array and
//! a version counter. Conditional writes are single statements, so several
//! processes may share one database file.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};

use super::{ActivationStore, SaveOutcome};
use crate::error::{StoreError, StoreResult};
use crate::model::{ActivationRecord, KeyActivationSet};

/// How long a writer waits for another connection's file lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent activation store backed by SQLite.
#[derive(Clone)]
pub struct SqliteActivationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteActivationStore {
    /// Opens (or creates) an activation store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            StoreError::Database(format!("failed to open activation store: {e}"))
        })?;
        Self::init(conn)
    }

    /// Opens an in-memory activation store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StoreError::Database(format!("failed to open in-memory activation store: {e}"))
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS activation_sets (
                key_id TEXT PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                max_activations INTEGER NOT NULL,
                activations TEXT NOT NULL,
                version INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| StoreError::Database(format!("failed to init activation schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("activation store lock poisoned".to_string()))
    }
}

/// `(key_id, owner_id, max_activations, activations_json, version)`
type SetRow = (String, i64, i64, String, i64);

fn row_to_set(row: SetRow) -> StoreResult<KeyActivationSet> {
    let (key_id, owner_id, max, json, version) = row;
    let activations: Vec<ActivationRecord> = serde_json::from_str(&json)?;
    let corrupt = |detail: String| StoreError::Corrupt {
        key_id: key_id.clone(),
        detail,
    };
    let max = u32::try_from(max).map_err(|_| corrupt(format!("bad max_activations {max}")))?;
    let version = u64::try_from(version).map_err(|_| corrupt(format!("bad version {version}")))?;
    KeyActivationSet::from_stored(key_id, owner_id, max, activations, version)
}

impl ActivationStore for SqliteActivationStore {
    fn load_activation_set(&self, key_id: &str) -> StoreResult<Option<KeyActivationSet>> {
        let conn = self.conn()?;
        let row: Option<SetRow> = conn
            .query_row(
                "SELECT key_id, owner_id, max_activations, activations, version
                 FROM activation_sets WHERE key_id = ?1",
                params![key_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()
            .map_err(|e| StoreError::Database(format!("failed to load activation set: {e}")))?;
        row.map(row_to_set).transpose()
    }

    fn save_activation_set(
        &self,
        set: &KeyActivationSet,
        expected_version: Option<u64>,
    ) -> StoreResult<SaveOutcome> {
        if set.count() > set.max_activations {
            return Err(StoreError::Corrupt {
                key_id: set.key_id.clone(),
                detail: format!("{} records exceed {} slots", set.count(), set.max_activations),
            });
        }
        let json = serde_json::to_string(set.activations())?;
        let conn = self.conn()?;

        let (changed, version) = match expected_version {
            None => {
                let changed = conn
                    .execute(
                        "INSERT OR IGNORE INTO activation_sets
                         (key_id, owner_id, max_activations, activations, version)
                         VALUES (?1, ?2, ?3, ?4, 1)",
                        params![set.key_id, set.owner_id, set.max_activations, json],
                    )
                    .map_err(|e| {
                        StoreError::Database(format!("failed to insert activation set: {e}"))
                    })?;
                (changed, 1)
            }
            Some(expected) => {
                let expected_i64 = i64::try_from(expected).map_err(|_| StoreError::Corrupt {
                    key_id: set.key_id.clone(),
                    detail: format!("version {expected} out of range"),
                })?;
                let changed = conn
                    .execute(
                        "UPDATE activation_sets
                         SET owner_id = ?2, max_activations = ?3, activations = ?4,
                             version = version + 1
                         WHERE key_id = ?1 AND version = ?5",
                        params![
                            set.key_id,
                            set.owner_id,
                            set.max_activations,
                            json,
                            expected_i64
                        ],
                    )
                    .map_err(|e| {
                        StoreError::Database(format!("failed to update activation set: {e}"))
                    })?;
                (changed, expected + 1)
            }
        };

        if changed == 0 {
            Ok(SaveOutcome::Conflict)
        } else {
            Ok(SaveOutcome::Saved { version })
        }
    }

    fn list_activation_sets(&self) -> StoreResult<Vec<KeyActivationSet>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT key_id, owner_id, max_activations, activations, version
                 FROM activation_sets ORDER BY key_id",
            )
            .map_err(|e| StoreError::Database(format!("failed to prepare activation query: {e}")))?;
        let rows = stmt
            .query_map([], |row| -> rusqlite::Result<SetRow> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .map_err(|e| StoreError::Database(format!("failed to query activation sets: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let row = row
                .map_err(|e| StoreError::Database(format!("failed to read activation row: {e}")))?;
            result.push(row_to_set(row)?);
        }
        Ok(result)
    }
}
