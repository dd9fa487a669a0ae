use std::time::Duration;

use sessionkit_core::{DEFAULT_GC_LIFETIME_SECS, DEFAULT_SESSION_NAME, SessionOptions};
use tower_cookies::cookie::SameSite;

/// Cookie and persistence settings of the session middleware.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cookie name, also the key the id is looked up under.
    pub session_name: String,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    /// Cookie `Max-Age` in seconds. `0` keeps the cookie until the browser
    /// is closed; any other value is sent on every response.
    pub cookie_expire: i64,
    pub cookie_http_only: bool,
    /// Only honored for requests that arrived over HTTPS.
    ///
    /// `X-Forwarded-Proto` and the `https` header count as HTTPS and are
    /// taken at face value, so this assumes a trusted proxy that sets or
    /// strips them.
    pub cookie_secure: bool,
    pub cookie_same_site: Option<SameSite>,
    /// How long the backend keeps a session after its last write.
    pub gc_lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: DEFAULT_SESSION_NAME.to_owned(),
            cookie_path: "/".to_owned(),
            cookie_domain: None,
            cookie_expire: 0,
            cookie_http_only: true,
            cookie_secure: false,
            cookie_same_site: Some(SameSite::Lax),
            gc_lifetime: Duration::from_secs(DEFAULT_GC_LIFETIME_SECS),
        }
    }
}

impl SessionConfig {
    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    pub fn with_cookie_expire(mut self, seconds: i64) -> Self {
        self.cookie_expire = seconds;
        self
    }

    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_cookie_same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    pub fn with_gc_lifetime(mut self, gc_lifetime: Duration) -> Self {
        self.gc_lifetime = gc_lifetime;
        self
    }

    pub(crate) fn session_options(&self) -> SessionOptions {
        SessionOptions {
            name: self.session_name.clone(),
            cookie_expire: self.cookie_expire,
            gc_lifetime: self.gc_lifetime,
        }
    }
}
