mod cli;

use std::io;
use std::sync::Arc;

use clap::Parser;
use cli::{Opts, OptsCmd, ServeOpts};
use sessionkit_core::{HandlerError, MemorySessionHandler, SessionHandler};
use sessionkit_demo::{Server, ServerError};
use sessionkit_redb_store::{RedbHandlerInitError, RedbSessionHandler};
use sessionkit_util_error::WhateverResult;
use snafu::{FromString, ResultExt, Snafu, Whatever};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "sessionkit::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Session database error: {source}"))]
    Database { source: RedbHandlerInitError },
    #[snafu(display("Server error: {source}"))]
    Server { source: ServerError },
    #[snafu(display("Session backend error: {source}"))]
    Handler { source: HandlerError },
    #[snafu(display("Miscellaneous error: {source}"))]
    Whatever { source: Whatever },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(WhateverSnafu)?;

    let opts = Opts::parse();
    let v = handle_cmd(opts).await?;
    println!("{}", serde_json::to_string_pretty(&v).expect("Can't fail"));
    Ok(())
}

async fn handle_cmd(opts: Opts) -> CliResult<serde_json::Value> {
    Ok(match opts.cmd {
        OptsCmd::Serve(serve_opts) => {
            serve(serve_opts).await?;
            serde_json::Value::Null
        }
        OptsCmd::Purge { db } => {
            let handler = RedbSessionHandler::open(db).await.context(DatabaseSnafu)?;
            let purged = handler.purge_expired().await.context(HandlerSnafu)?;

            serde_json::json!({ "purged": purged })
        }
    })
}

async fn serve(opts: ServeOpts) -> CliResult<()> {
    let handler: Arc<dyn SessionHandler> = match opts.db {
        Some(ref path) if !opts.in_memory => {
            info!(target: LOG_TARGET, path = %path.display(), "Using redb session storage");
            Arc::new(
                RedbSessionHandler::open(path)
                    .await
                    .context(DatabaseSnafu)?
                    .with_key_prefix(&opts.cookie.session_name),
            )
        }
        _ => {
            info!(target: LOG_TARGET, "Using in-memory session storage");
            Arc::new(MemorySessionHandler::new().with_key_prefix(&opts.cookie.session_name))
        }
    };

    let server = Server::builder()
        .listen(opts.listen)
        .handler(handler)
        .config(opts.cookie.to_config())
        .reuseport(opts.reuseport)
        .build()
        .await
        .context(ServerSnafu)?;

    server.run().await.context(ServerSnafu)?;

    Ok(())
}

pub fn init_logging() -> WhateverResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| Whatever::without_source("Failed to initialize logging".to_string()))?;

    Ok(())
}
