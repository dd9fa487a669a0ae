//! Tower middleware attaching a server-side [`Session`] to every request.
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum::Router;
//! use sessionkit_core::MemorySessionHandler;
//! use sessionkit_middleware::{SessionConfig, SessionLayer};
//!
//! let app = Router::new()
//!     .route("/", axum::routing::get(handler))
//!     .layer(
//!         SessionLayer::new(Arc::new(MemorySessionHandler::new()))
//!             .with_config(SessionConfig::default().with_cookie_expire(3600)),
//!     );
//! ```

mod config;
pub mod cookie;
mod extract;
mod service;

pub use sessionkit_core::{Session, SessionHandler, SessionId};
pub use tower_cookies::cookie::SameSite;

pub use self::config::SessionConfig;
pub use self::extract::SessionHandle;
pub use self::service::{SessionLayer, SessionService};

pub(crate) const LOG_TARGET: &str = "sessionkit::middleware";
