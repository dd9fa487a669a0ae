//! Small axum application showing the session middleware in action.
//!
//! It stores a posted JSON document in the session and hands it back on
//! later requests, and lets the client regenerate or destroy the session.

mod error;
pub mod routes;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sessionkit_core::SessionHandler;
use sessionkit_middleware::{SessionConfig, SessionLayer};
use snafu::{ResultExt as _, Snafu};
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

pub use self::error::{ErrorResponse, RequestError, RequestResult};

pub(crate) const LOG_TARGET: &str = "sessionkit::demo";

#[derive(Debug, Snafu)]
pub enum ServerError {
    #[snafu(transparent)]
    IO { source: io::Error },
    #[snafu(display("Server task failed"))]
    Join { source: tokio::task::JoinError },
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Demo routes with the session layer applied.
pub fn make_router(handler: Arc<dyn SessionHandler>, config: SessionConfig) -> Router {
    routes::route_handler().layer(SessionLayer::new(handler).with_config(config))
}

pub struct Server {
    listener: TcpListener,
    router: Router,
}

#[bon::bon]
impl Server {
    #[builder(finish_fn(name = "build"))]
    pub async fn new(
        listen: SocketAddr,
        handler: Arc<dyn SessionHandler>,
        #[builder(default)] config: SessionConfig,
        #[builder(default = false)] reuseport: bool,
    ) -> ServerResult<Self> {
        let listener = Self::get_listener(listen, reuseport)?;
        info!(target: LOG_TARGET, addr = %listener.local_addr()?, "Listening");

        Ok(Self {
            listener,
            router: make_router(handler, config),
        })
    }
}

impl Server {
    fn get_listener(addr: SocketAddr, reuseport: bool) -> ServerResult<TcpListener> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if reuseport {
            #[cfg(unix)]
            socket.set_reuseport(true)?;
        }
        socket.set_nodelay(true)?;
        socket.bind(addr)?;

        Ok(socket.listen(1024)?)
    }

    pub fn addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until ctrl-c or SIGTERM.
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ServerResult<()> {
        info!(target: LOG_TARGET, "Starting server");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!(target: LOG_TARGET, "Server stopped");
        Ok(())
    }

    /// Serve on a background task, stopping when the returned handle says
    /// so.
    pub fn spawn(self) -> ServerResult<RunningServer> {
        let addr = self.addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        Ok(RunningServer {
            addr,
            shutdown_tx,
            task,
        })
    }
}

pub struct RunningServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<ServerResult<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(self) -> ServerResult<()> {
        let _ = self.shutdown_tx.send(());
        self.task.await.context(JoinSnafu)?
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
