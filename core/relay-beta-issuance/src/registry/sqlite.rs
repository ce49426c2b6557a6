//! SQLite-backed token registry.
//!
//! Issuance runs inside a `BEGIN IMMEDIATE` transaction, which takes the
//! database write lock up front, so the owner check, the cap check, the
//! insert and the counter increment cannot interleave with another writer.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use relay_beta_license::SignedToken;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::{SaveIssued, TokenRegistry};
use crate::error::{RegistryError, RegistryResult};
use crate::record::IssuedToken;

/// How long a writer waits for another connection's file lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent token registry backed by SQLite.
#[derive(Clone)]
pub struct SqliteTokenRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTokenRegistry {
    /// Opens (or creates) a registry at the given path.
    pub fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| RegistryError::Database(format!("failed to open registry: {e}")))?;
        Self::init(conn)
    }

    /// Opens an in-memory registry (for testing).
    pub fn open_in_memory() -> RegistryResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            RegistryError::Database(format!("failed to open in-memory registry: {e}"))
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> RegistryResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS issued_tokens (
                owner_id INTEGER PRIMARY KEY,
                token TEXT NOT NULL,
                key_id TEXT NOT NULL,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS issuance_counter (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                keys_issued INTEGER NOT NULL
            );

            INSERT OR IGNORE INTO issuance_counter (id, keys_issued) VALUES (1, 0);
            ",
        )
        .map_err(|e| RegistryError::Database(format!("failed to init registry schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> RegistryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RegistryError::Database("registry lock poisoned".to_string()))
    }
}

fn load_token(conn: &Connection, owner_id: i64) -> RegistryResult<Option<IssuedToken>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT token FROM issued_tokens WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| RegistryError::Database(format!("failed to load issued token: {e}")))?;

    raw.map(|raw| {
        SignedToken::decode(&raw)
            .and_then(IssuedToken::new)
            .map_err(|e| RegistryError::Corrupt {
                owner_id,
                detail: e.to_string(),
            })
    })
    .transpose()
}

fn read_count(conn: &Connection) -> RegistryResult<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT keys_issued FROM issuance_counter WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .map_err(|e| RegistryError::Database(format!("failed to read issued count: {e}")))?;
    u64::try_from(count).map_err(|_| RegistryError::CorruptCount(count))
}

impl TokenRegistry for SqliteTokenRegistry {
    fn load_issued_token(&self, owner_id: i64) -> RegistryResult<Option<IssuedToken>> {
        let conn = self.conn()?;
        load_token(&conn, owner_id)
    }

    fn save_issued_token(&self, token: &IssuedToken, cap: u64) -> RegistryResult<SaveIssued> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RegistryError::Database(format!("failed to begin issuance: {e}")))?;

        if let Some(existing) = load_token(&tx, token.owner_id())? {
            return Ok(SaveIssued::AlreadyIssued(existing));
        }
        let issued = read_count(&tx)?;
        if issued >= cap {
            return Ok(SaveIssued::CapReached {
                issued_count: issued,
            });
        }

        let envelope = token.envelope();
        tx.execute(
            "INSERT INTO issued_tokens (owner_id, token, key_id, issued_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                envelope.owner_id,
                token.encoded(),
                envelope.key_id,
                envelope.issued_at,
                envelope.expires_at
            ],
        )
        .map_err(|e| RegistryError::Database(format!("failed to save issued token: {e}")))?;
        tx.execute(
            "UPDATE issuance_counter SET keys_issued = keys_issued + 1 WHERE id = 1",
            [],
        )
        .map_err(|e| RegistryError::Database(format!("failed to bump issued count: {e}")))?;
        let issued_count = read_count(&tx)?;

        tx.commit()
            .map_err(|e| RegistryError::Database(format!("failed to commit issuance: {e}")))?;
        Ok(SaveIssued::Saved { issued_count })
    }

    fn issued_count(&self) -> RegistryResult<u64> {
        let conn = self.conn()?;
        read_count(&conn)
    }
}
