use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sessionkit_util_error::FmtCompact as _;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, trace, warn};

use crate::payload::PayloadError;
use crate::{
    DEFAULT_GC_LIFETIME_SECS, DEFAULT_SESSION_NAME, HandlerError, LOG_TARGET, SessionData,
    SessionHandler, SessionId,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("Session not started"))]
    NotStarted,
    #[snafu(transparent)]
    Handler { source: HandlerError },
    #[snafu(transparent)]
    Payload { source: PayloadError },
    #[snafu(display("Invalid value for session key `{key}`"))]
    Value {
        key: String,
        source: serde_json::Error,
    },
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Per-session settings, fixed for the lifetime of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Cookie name the id travels under.
    pub name: String,
    /// Client-side cookie lifetime in seconds; `0` means a browser-session
    /// cookie.
    pub cookie_expire: i64,
    /// How long the backend keeps the payload after the last write.
    pub gc_lifetime: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_SESSION_NAME.to_owned(),
            cookie_expire: 0,
            gc_lifetime: Duration::from_secs(DEFAULT_GC_LIFETIME_SECS),
        }
    }
}

/// Request-scoped session state.
///
/// Created when a request comes in, started explicitly by whoever needs
/// the data, and persisted by [`Session::close`] when the response is
/// emitted. Never reused across requests.
pub struct Session {
    handler: Arc<dyn SessionHandler>,
    options: SessionOptions,
    id: Option<SessionId>,
    data: SessionData,
    is_new: bool,
    is_started: bool,
    is_destroyed: bool,
    is_closed: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.options.name)
            .field("id", &self.id)
            .field("keys", &self.data.len())
            .field("is_new", &self.is_new)
            .field("is_started", &self.is_started)
            .field("is_destroyed", &self.is_destroyed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// `id` is the value the client presented, if any.
    pub fn new(
        handler: Arc<dyn SessionHandler>,
        id: Option<SessionId>,
        options: SessionOptions,
    ) -> Self {
        Self {
            handler,
            options,
            id,
            data: SessionData::default(),
            is_new: false,
            is_started: false,
            is_destroyed: false,
            is_closed: false,
        }
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The id was generated during this request.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    pub fn is_destroyed(&self) -> bool {
        self.is_destroyed
    }

    /// Make the session data available.
    ///
    /// Without an id from the client, a new session is created only if
    /// `create` is set; otherwise `Ok(false)` is returned and the session
    /// stays unusable. With an id, the stored payload is loaded. A payload
    /// that fails to decode is logged and the session starts empty.
    pub async fn start(&mut self, create: bool) -> SessionResult<bool> {
        if self.is_started {
            return Ok(true);
        }

        match self.id.as_ref() {
            None if !create => return Ok(false),
            None => {
                let id = self.handler.create_session_id();
                debug!(target: LOG_TARGET, %id, "Created new session");
                self.id = Some(id);
                self.is_new = true;
            }
            Some(id) => {
                if let Some(payload) = self.handler.read(id).await? {
                    match SessionData::decode(&payload) {
                        Ok(stored) => self.data.merge(stored),
                        Err(err) => {
                            warn!(
                                target: LOG_TARGET,
                                %id,
                                err = %err.fmt_compact(),
                                "Ignoring corrupt session payload"
                            );
                        }
                    }
                } else {
                    trace!(target: LOG_TARGET, %id, "No stored session payload");
                }
            }
        }

        self.is_started = true;
        Ok(true)
    }

    fn data(&self) -> SessionResult<&SessionData> {
        if !self.is_started {
            return NotStartedSnafu.fail();
        }
        Ok(&self.data)
    }

    fn data_mut(&mut self) -> SessionResult<&mut SessionData> {
        if !self.is_started {
            return NotStartedSnafu.fail();
        }
        Ok(&mut self.data)
    }

    pub fn get_value(&self, key: &str) -> SessionResult<Option<&Value>> {
        Ok(self.data()?.get(key))
    }

    pub fn get<T>(&self, key: &str) -> SessionResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.get_value(key)?
            .map(|value| T::deserialize(value).context(ValueSnafu { key }))
            .transpose()
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> SessionResult<T>
    where
        T: DeserializeOwned,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn set<T>(&mut self, key: impl Into<String>, value: T) -> SessionResult<()>
    where
        T: Serialize,
    {
        let key = key.into();
        let value = serde_json::to_value(value).context(ValueSnafu { key: key.as_str() })?;
        self.data_mut()?.insert(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> SessionResult<Option<Value>> {
        Ok(self.data_mut()?.remove(key))
    }

    pub fn keys(&self) -> SessionResult<impl Iterator<Item = &str>> {
        Ok(self.data()?.keys())
    }

    pub fn is_empty(&self) -> SessionResult<bool> {
        Ok(self.data()?.is_empty())
    }

    /// Switch to a freshly generated id.
    ///
    /// With `delete_old`, the entry under the previous id is deleted and
    /// the data is cleared. Otherwise the current data carries over to the
    /// new id and the old entry is left to expire in the backend.
    pub async fn regenerate_session_id(&mut self, delete_old: bool) -> SessionResult<()> {
        let new_id = self.handler.create_session_id();

        if delete_old {
            if let Some(old_id) = self.id.as_ref() {
                // clear only once the old entry is gone
                self.handler.delete(old_id).await?;
                self.data.clear();
            }
        }

        debug!(
            target: LOG_TARGET,
            old_id = ?self.id,
            %new_id,
            delete_old,
            "Regenerated session id"
        );
        self.id = Some(new_id);
        self.is_new = true;
        Ok(())
    }

    /// Delete the session from the backend and tell the client to drop it.
    pub async fn destroy(&mut self) -> SessionResult<()> {
        let Some(id) = self.id.as_ref() else {
            return Ok(());
        };

        self.handler.delete(id).await?;
        debug!(target: LOG_TARGET, %id, "Destroyed session");

        self.data.clear();
        self.is_destroyed = true;
        self.is_new = false;
        self.is_started = false;
        Ok(())
    }

    /// Persist a started session and release backend resources.
    ///
    /// Only the first call does anything. [`SessionHandler::close`] is
    /// called even if the write fails; the write error is returned after.
    pub async fn close(&mut self) -> SessionResult<()> {
        if self.is_closed {
            return Ok(());
        }
        self.is_closed = true;

        let persisted = self.persist().await;
        let closed = self.handler.close().await;

        persisted?;
        closed?;
        Ok(())
    }

    async fn persist(&mut self) -> SessionResult<()> {
        if !self.is_started {
            return Ok(());
        }
        let Some(id) = self.id.as_ref() else {
            return Ok(());
        };

        let payload = self.data.encode()?;
        self.handler
            .write(id, payload, self.options.gc_lifetime)
            .await?;
        trace!(target: LOG_TARGET, %id, keys = self.data.len(), "Persisted session");

        self.is_started = false;
        Ok(())
    }

    /// Whether the response has to carry a `Set-Cookie` for this session.
    pub fn should_send_cookie(&self) -> bool {
        if self.id.is_none() {
            return false;
        }

        self.is_destroyed || self.is_new || self.options.cookie_expire != 0
    }
}
