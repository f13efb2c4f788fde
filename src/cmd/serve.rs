/*!
`serve.rs`

Implements the `serve` subcommand: bind, accept until interrupted, hand each
connection to the proxy handler.

Settings come from (highest first):
  --host / --port / --timeout      (or LIVEPROXY_HOST / LIVEPROXY_PORT)
  --config liveproxy.(json|yaml)
  built-in defaults                (127.0.0.1:53422, no timeout)

Port 0 asks the OS for an ephemeral port; the chosen port is logged.
Failure to bind is the only fatal error; it aborts startup.
*/

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::{self, FileConfig, Overrides, ServerConfig};
use crate::proxy::{AppState, serve};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "LIVEPROXY_HOST", value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (0 = pick a free port)
    #[arg(short, long, env = "LIVEPROXY_PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// Kill a tool that runs longer than this many seconds (0 = never)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Load settings and extra tool families from a JSON or YAML file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn execute_serve(args: ServeArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => config::load_file(path)?,
        None => FileConfig::default(),
    };
    let cfg = config::resolve(
        file,
        Overrides {
            host: args.host,
            port: args.port,
            timeout_secs: args.timeout,
        },
    )?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(run(cfg))
}

async fn run(cfg: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port))
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr()))?;
    let local = listener
        .local_addr()
        .context("failed to read bound address")?;
    info!("Listening on {}", local.port());

    for family in &cfg.families {
        debug!(
            family = %family.name,
            pattern = family.pattern(),
            args = ?family.args,
            "tool family"
        );
    }
    if let Some(limit) = cfg.timeout {
        info!("tool timeout: {limit:?}");
    }

    let state = AppState::new(cfg.families, cfg.timeout);
    serve(listener, state, shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;
    info!("stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down...");
}
