//! Server-side HTTP session state.
//!
//! A [`Session`] ties an opaque [`SessionId`] (carried in a cookie) to a bag
//! of key/value data kept in a pluggable [`SessionHandler`] between
//! requests. The session is loaded on demand, mutated by request handlers
//! and persisted exactly once when the response goes out.

mod handler;
mod id;
mod memory;
mod payload;
mod session;


pub use self::handler::{
    BackendSnafu, HandlerError, HandlerResult, JoinSnafu, SessionHandler, session_key,
};
pub use self::id::{EmptySessionIdError, SessionId};
pub use self::memory::MemorySessionHandler;
pub use self::payload::{PayloadError, PayloadResult, SessionData};
pub use self::session::{Session, SessionError, SessionOptions, SessionResult};

/// Cookie name used when the application does not pick one.
///
/// Also the default storage key prefix of the bundled handlers, so that
/// entries written by older deployments stay readable.
pub const DEFAULT_SESSION_NAME: &str = "PYSESSONID";

/// Default time a persisted session payload stays valid in the backend.
pub const DEFAULT_GC_LIFETIME_SECS: u64 = 30 * 60;

pub(crate) const LOG_TARGET: &str = "sessionkit::session";
