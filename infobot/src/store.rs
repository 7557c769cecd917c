//! Factoid storage backed by SQLite.
//!
//! A factoid is a key/value pair with provenance. Keys are case-sensitive
//! and may hold any number of values; identical pairs are stored as
//! separate rows. There is no update: corrections are a forget + learn.
//!
//! Every operation goes through [`FactoidStore::with_connection`], which
//! checks the held connection and reopens it at most once before running
//! the query.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

/// Errors surfaced by the factoid store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open factoid database at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("factoid query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// A stored factoid row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factoid {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub author: String,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    pub locked: bool,
}

impl Factoid {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let secs: i64 = row.get(5)?;
        Ok(Self {
            id: row.get(0)?,
            key: row.get(1)?,
            value: row.get(2)?,
            author: row.get(3)?,
            channel: row.get(4)?,
            timestamp: DateTime::from_timestamp(secs, 0).unwrap_or_default(),
            locked: row.get(6)?,
        })
    }
}

const COLUMNS: &str = "factoid_id, factoid_key, factoid_value, factoid_author, \
                       factoid_channel, factoid_timestamp, factoid_locked";

/// The factoid knowledge base.
pub struct FactoidStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl FactoidStore {
    /// Open or create the factoid database. Fails if the database cannot be
    /// opened right now; later operations reconnect on their own.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        tracing::info!(path = %path.display(), "Connecting to factoid database");
        let conn = connect(&path)?;
        tracing::info!("Connection successful");
        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    /// Run `op` against a live connection.
    ///
    /// A connection that fails the liveness check (or was closed) is
    /// replaced by a fresh one; if that single reconnect fails the error is
    /// returned and the next call tries again.
    pub fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock();
        let conn = match guard.take() {
            Some(conn) if is_alive(&conn) => guard.insert(conn),
            stale => {
                if stale.is_some() {
                    tracing::warn!("Factoid database connection went stale, reconnecting");
                }
                drop(stale);
                guard.insert(connect(&self.path)?)
            }
        };
        Ok(op(conn)?)
    }

    /// All values stored under `key`, oldest first. Empty when unknown.
    pub fn lookup_by_key(&self, key: &str) -> Result<Vec<Factoid>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM factoids WHERE factoid_key = ?1 ORDER BY factoid_id ASC"
            ))?;
            let factoids = stmt
                .query_map(params![key], Factoid::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>();
            factoids
        })
    }

    /// A uniformly random factoid, or `None` if the store is empty.
    pub fn lookup_random(&self) -> Result<Option<Factoid>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM factoids ORDER BY RANDOM() LIMIT 1"
            ))?;
            let mut rows = stmt.query_map([], Factoid::from_row)?;
            let picked = rows.next().transpose();
            picked
        })
    }

    /// Append a factoid stamped with the current time.
    pub fn insert(&self, key: &str, text: &str, author: &str, channel: &str) -> Result<(), StoreError> {
        self.insert_at(key, text, author, channel, Utc::now())
    }

    /// Append a factoid with an explicit creation time (imports and tests).
    pub fn insert_at(
        &self,
        key: &str,
        text: &str,
        author: &str,
        channel: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO factoids (factoid_key, factoid_value, factoid_author,
                                       factoid_channel, factoid_timestamp, factoid_locked)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![key, text, author, channel, timestamp.timestamp()],
            )
        })?;
        Ok(())
    }

    /// Delete rows matching both `key` and `text`. Returns rows removed.
    pub fn delete_exact(&self, key: &str, text: &str) -> Result<usize, StoreError> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM factoids WHERE factoid_key = ?1 AND factoid_value = ?2",
                params![key, text],
            )
        })
    }

    /// Delete every row stored under `key`. Returns rows removed.
    pub fn delete_all_for_key(&self, key: &str) -> Result<usize, StoreError> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM factoids WHERE factoid_key = ?1", params![key])
        })
    }

    /// Number of stored factoids.
    pub fn count(&self) -> Result<u64, StoreError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM factoids", [], |row| row.get(0))
        })
    }

    /// Drop the held connection. The next operation reconnects.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            tracing::info!("Closing connection to factoid database");
        }
    }

    /// Whether a connection is currently held.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn connect(path: &Path) -> Result<Connection, StoreError> {
    let map_err = |source| StoreError::Connect {
        path: path.display().to_string(),
        source,
    };
    let conn = Connection::open(path).map_err(map_err)?;
    init(&conn).map_err(map_err)?;
    Ok(conn)
}

fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS factoids (
            factoid_id        INTEGER PRIMARY KEY AUTOINCREMENT,
            factoid_key       TEXT NOT NULL,
            factoid_value     TEXT NOT NULL,
            factoid_author    TEXT NOT NULL,
            factoid_channel   TEXT NOT NULL,
            factoid_timestamp INTEGER NOT NULL,
            factoid_locked    INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_factoids_key ON factoids(factoid_key);",
    )
}

fn is_alive(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
}
