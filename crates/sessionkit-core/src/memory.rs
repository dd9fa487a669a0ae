use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{DEFAULT_SESSION_NAME, HandlerResult, SessionHandler, SessionId, session_key};

#[derive(Debug)]
struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Session handler keeping payloads in process memory.
///
/// Lost on restart and not shared between processes. Meant for tests and
/// single-instance setups.
#[derive(Debug)]
pub struct MemorySessionHandler {
    key_prefix: String,
    entries: Mutex<HashMap<String, Entry>>,
    closes: AtomicU64,
}

impl Default for MemorySessionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionHandler {
    pub fn new() -> Self {
        Self {
            key_prefix: DEFAULT_SESSION_NAME.to_owned(),
            entries: Mutex::new(HashMap::new()),
            closes: AtomicU64::new(0),
        }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Whether a live (not expired) entry exists for `id`.
    pub fn contains(&self, id: &SessionId) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .expect("Locking failed")
            .get(&session_key(&self.key_prefix, id))
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("Locking failed").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("Locking failed");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Store raw bytes under `id`, bypassing the session layer.
    pub fn insert_raw(&self, id: &SessionId, payload: Vec<u8>, ttl: Duration) {
        self.entries.lock().expect("Locking failed").insert(
            session_key(&self.key_prefix, id),
            Entry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// How many times [`SessionHandler::close`] was called.
    pub fn close_count(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionHandler for MemorySessionHandler {
    async fn read(&self, id: &SessionId) -> HandlerResult<Option<Vec<u8>>> {
        let key = session_key(&self.key_prefix, id);
        let mut entries = self.entries.lock().expect("Locking failed");

        match entries.get(&key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(Instant::now()) => {
                return Ok(Some(entry.payload.clone()));
            }
            Some(_) => {}
        }

        entries.remove(&key);
        Ok(None)
    }

    async fn write(&self, id: &SessionId, payload: Vec<u8>, ttl: Duration) -> HandlerResult<()> {
        self.insert_raw(id, payload, ttl);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> HandlerResult<()> {
        self.entries
            .lock()
            .expect("Locking failed")
            .remove(&session_key(&self.key_prefix, id));
        Ok(())
    }

    async fn close(&self) -> HandlerResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
