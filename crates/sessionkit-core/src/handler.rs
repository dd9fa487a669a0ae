use std::time::Duration;

use async_trait::async_trait;
use sessionkit_util_error::BoxedError;
use snafu::Snafu;
use tokio::task::JoinError;

use crate::SessionId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HandlerError {
    #[snafu(display("Session backend error"))]
    Backend { source: BoxedError },
    #[snafu(display("Session backend task failed"))]
    Join { source: JoinError },
}

pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Storage contract for session payloads.
///
/// A plain key/value store with per-entry expiry. It knows nothing about
/// session semantics: payloads are opaque bytes produced by
/// [`crate::SessionData::encode`].
///
/// One instance is shared by all requests. Connection pooling, if any, is
/// the implementation's business; [`SessionHandler::close`] is called once
/// at the end of every request that had a session attached.
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    /// Generate a new, unguessable session id.
    fn create_session_id(&self) -> SessionId {
        SessionId::random()
    }

    /// Fetch the payload stored for `id`.
    ///
    /// Missing and expired entries are both `Ok(None)`.
    async fn read(&self, id: &SessionId) -> HandlerResult<Option<Vec<u8>>>;

    /// Store (or overwrite) the payload for `id`, valid for `ttl`.
    async fn write(&self, id: &SessionId, payload: Vec<u8>, ttl: Duration) -> HandlerResult<()>;

    /// Remove the payload for `id`. Removing a missing entry is not an error.
    async fn delete(&self, id: &SessionId) -> HandlerResult<()>;

    /// Release per-request backend resources.
    async fn close(&self) -> HandlerResult<()> {
        Ok(())
    }
}

/// Storage key of a session: `prefix` directly followed by the id.
pub fn session_key(prefix: &str, id: &SessionId) -> String {
    format!("{prefix}{id}")
}
