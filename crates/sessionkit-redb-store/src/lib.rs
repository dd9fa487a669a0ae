//! Redb-backed session handler for sessionkit.
//!
//! Payloads survive server restarts and expire according to the TTL passed
//! with every write.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sessionkit_redb_store::RedbSessionHandler;
//!
//! let db = redb::Database::create("sessions.redb")?;
//! let db = Arc::new(redb_bincode::Database::from(db));
//! let handler = RedbSessionHandler::new(db)?.with_key_prefix("myapp:");
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bincode::{Decode, Encode};
use redb_bincode::{ReadableTable as _, TableDefinition};
use sessionkit_core::{
    DEFAULT_SESSION_NAME, HandlerError, HandlerResult, JoinSnafu, SessionHandler, SessionId,
    session_key,
};
use snafu::{ResultExt as _, Snafu};
use time::OffsetDateTime;
use tracing::debug;

const LOG_TARGET: &str = "sessionkit::redb";

/// Payload as kept in redb.
///
/// The expiry is a Unix timestamp, since redb has no TTL of its own.
#[derive(Debug, Clone, Encode, Decode)]
struct StoredPayload {
    payload: Vec<u8>,
    expiry_unix: i64,
}

impl StoredPayload {
    fn new(payload: Vec<u8>, ttl: Duration) -> Self {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            payload,
            expiry_unix: now_unix().saturating_add(ttl),
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expiry_unix <= now
    }
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Key: storage key (`prefix` + session id)
/// Value: payload with its expiry
const SESSIONS_TABLE: TableDefinition<String, StoredPayload> =
    TableDefinition::new("sessionkit_redb_store::sessions");

#[derive(Debug, Snafu)]
pub enum RedbHandlerInitError {
    #[snafu(transparent)]
    Database { source: redb::DatabaseError },
    #[snafu(transparent)]
    Transaction {
        #[snafu(source(from(redb::TransactionError, Box::new)))]
        source: Box<redb::TransactionError>,
    },
    #[snafu(transparent)]
    Table { source: redb::TableError },
    #[snafu(transparent)]
    Commit { source: redb::CommitError },
    #[snafu(display("Database open task failed"))]
    OpenJoin { source: tokio::task::JoinError },
}

fn backend<E>(err: E) -> HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    HandlerError::Backend {
        source: Box::new(err),
    }
}

/// Session handler storing payloads in a redb table.
#[derive(Debug, Clone)]
pub struct RedbSessionHandler {
    db: Arc<redb_bincode::Database>,
    key_prefix: String,
}

impl RedbSessionHandler {
    /// Use an already opened database, creating the sessions table if
    /// needed.
    ///
    /// Performs blocking I/O; call from a blocking context or use
    /// [`RedbSessionHandler::open`].
    pub fn new(db: Arc<redb_bincode::Database>) -> Result<Self, RedbHandlerInitError> {
        {
            let write_txn = db.begin_write()?;
            let _ = write_txn.open_table(&SESSIONS_TABLE)?;
            write_txn.commit()?;
        }

        Ok(Self {
            db,
            key_prefix: DEFAULT_SESSION_NAME.to_owned(),
        })
    }

    /// Open (or create) a database file dedicated to sessions.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RedbHandlerInitError> {
        let path = path.into();
        debug!(target: LOG_TARGET, path = %path.display(), "Opening session database");
        tokio::task::spawn_blocking(move || {
            let db = redb_bincode::Database::create(path)?;
            Self::new(Arc::new(db))
        })
        .await
        .context(OpenJoinSnafu)?
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    fn key(&self, id: &SessionId) -> String {
        session_key(&self.key_prefix, id)
    }

    /// Remove every expired payload, returning how many were dropped.
    pub async fn purge_expired(&self) -> HandlerResult<usize> {
        let db = self.db.clone();
        let purged = tokio::task::spawn_blocking(move || {
            let now = now_unix();
            let write_txn = db.begin_write().map_err(backend)?;
            let purged = {
                let mut table = write_txn.open_table(&SESSIONS_TABLE).map_err(backend)?;

                let mut expired = vec![];
                for record in table.range::<String>(..).map_err(backend)? {
                    let (k, v) = record.map_err(backend)?;
                    if v.value().is_expired(now) {
                        expired.push(k.value());
                    }
                }

                for key in &expired {
                    table.remove(key).map_err(backend)?;
                }
                expired.len()
            };
            write_txn.commit().map_err(backend)?;
            Ok::<_, HandlerError>(purged)
        })
        .await
        .context(JoinSnafu)??;

        debug!(target: LOG_TARGET, purged, "Purged expired sessions");
        Ok(purged)
    }
}

#[async_trait]
impl SessionHandler for RedbSessionHandler {
    async fn read(&self, id: &SessionId) -> HandlerResult<Option<Vec<u8>>> {
        let key = self.key(id);

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read().map_err(backend)?;
            let table = read_txn.open_table(&SESSIONS_TABLE).map_err(backend)?;

            let Some(stored) = table.get(&key).map_err(backend)?.map(|g| g.value()) else {
                return Ok(None);
            };

            if stored.is_expired(now_unix()) {
                return Ok(None);
            }

            Ok(Some(stored.payload))
        })
        .await
        .context(JoinSnafu)?
    }

    async fn write(&self, id: &SessionId, payload: Vec<u8>, ttl: Duration) -> HandlerResult<()> {
        let key = self.key(id);
        let stored = StoredPayload::new(payload, ttl);

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(backend)?;
            {
                let mut table = write_txn.open_table(&SESSIONS_TABLE).map_err(backend)?;
                table.insert(&key, &stored).map_err(backend)?;
            }
            write_txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
        .context(JoinSnafu)?
    }

    async fn delete(&self, id: &SessionId) -> HandlerResult<()> {
        let key = self.key(id);

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write().map_err(backend)?;
            {
                let mut table = write_txn.open_table(&SESSIONS_TABLE).map_err(backend)?;
                table.remove(&key).map_err(backend)?;
            }
            write_txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
        .context(JoinSnafu)?
    }
}
