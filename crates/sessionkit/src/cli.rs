use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sessionkit_core::{DEFAULT_GC_LIFETIME_SECS, DEFAULT_SESSION_NAME};
use sessionkit_middleware::{SameSite, SessionConfig};

/// Command line options for the sessionkit demo server
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(subcommand)]
    pub cmd: OptsCmd,
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Run the demo HTTP server
    Serve(ServeOpts),
    /// Drop expired sessions from a session database
    Purge {
        /// Path to the session database
        #[arg(long, env = "SESSIONKIT_DB")]
        db: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct ServeOpts {
    /// Listen address
    #[arg(long, short, default_value = "[::1]:8000", env = "SESSIONKIT_LISTEN")]
    pub listen: SocketAddr,

    /// Set SO_REUSEPORT
    #[arg(long, env = "SESSIONKIT_REUSEPORT")]
    pub reuseport: bool,

    /// Path to the session database
    #[arg(
        long,
        env = "SESSIONKIT_DB",
        conflicts_with = "in_memory",
        required_unless_present = "in_memory"
    )]
    pub db: Option<PathBuf>,

    /// Keep sessions in memory only
    #[arg(long)]
    pub in_memory: bool,

    #[command(flatten)]
    pub cookie: CookieOpts,
}

#[derive(Debug, Args)]
pub struct CookieOpts {
    /// Name of the session cookie
    #[arg(long, default_value = DEFAULT_SESSION_NAME, env = "SESSIONKIT_SESSION_NAME")]
    pub session_name: String,

    #[arg(long, default_value = "/", env = "SESSIONKIT_COOKIE_PATH")]
    pub cookie_path: String,

    #[arg(long, env = "SESSIONKIT_COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Cookie `Max-Age` in seconds, `0` for a browser-session cookie
    #[arg(long, default_value_t = 0, env = "SESSIONKIT_COOKIE_EXPIRE")]
    pub cookie_expire: i64,

    /// Let scripts read the session cookie
    #[arg(long)]
    pub no_http_only: bool,

    /// Mark the cookie `Secure` on HTTPS requests
    #[arg(long, env = "SESSIONKIT_COOKIE_SECURE")]
    pub cookie_secure: bool,

    #[arg(long, value_enum, default_value_t = SameSiteOpt::Lax)]
    pub cookie_same_site: SameSiteOpt,

    /// Seconds a session stays in the backend after its last write
    #[arg(long, default_value_t = DEFAULT_GC_LIFETIME_SECS, env = "SESSIONKIT_GC_LIFETIME")]
    pub gc_lifetime: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SameSiteOpt {
    Strict,
    Lax,
    None,
    /// Leave the attribute out
    Off,
}

impl From<SameSiteOpt> for Option<SameSite> {
    fn from(value: SameSiteOpt) -> Self {
        match value {
            SameSiteOpt::Strict => Some(SameSite::Strict),
            SameSiteOpt::Lax => Some(SameSite::Lax),
            SameSiteOpt::None => Some(SameSite::None),
            SameSiteOpt::Off => None,
        }
    }
}

impl CookieOpts {
    pub fn to_config(&self) -> SessionConfig {
        let config = SessionConfig::default()
            .with_session_name(&self.session_name)
            .with_cookie_path(&self.cookie_path)
            .with_cookie_expire(self.cookie_expire)
            .with_cookie_http_only(!self.no_http_only)
            .with_cookie_secure(self.cookie_secure)
            .with_cookie_same_site(self.cookie_same_site.into())
            .with_gc_lifetime(Duration::from_secs(self.gc_lifetime));

        match self.cookie_domain.as_deref() {
            Some(domain) => config.with_cookie_domain(domain),
            None => config,
        }
    }
}
