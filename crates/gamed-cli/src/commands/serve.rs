//! `gamed serve` command.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use gamed_host::config::{ENV_BIND_HOST, ENV_BLUEPRINTS, ENV_LISTENING_PORT, ENV_STORE_DIR};
use gamed_host::{GrainHost, HostConfig, http};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Gateway port
    #[arg(long, env = ENV_LISTENING_PORT)]
    pub port: Option<u16>,

    /// Gateway bind address
    #[arg(long, env = ENV_BIND_HOST)]
    pub host: Option<IpAddr>,

    /// Directory for grain state (default: in-memory, lost on exit)
    #[arg(long, env = ENV_STORE_DIR)]
    pub store_dir: Option<PathBuf>,

    /// JSON blueprint file (default: built-in registry)
    #[arg(long, env = ENV_BLUEPRINTS)]
    pub blueprints: Option<PathBuf>,

    /// Seconds a gateway request waits for a grain
    #[arg(long, default_value_t = 5)]
    pub request_timeout_secs: u64,
}

impl ServeArgs {
    fn config(&self) -> Result<HostConfig> {
        let base = HostConfig::from_env().context("read GAMED_* environment")?;
        Ok(self.apply(base))
    }

    /// Flags given on the command line win over `base`.
    fn apply(&self, mut config: HostConfig) -> HostConfig {
        if let Some(port) = self.port {
            config.bind.set_port(port);
        }
        if let Some(host) = self.host {
            config.bind.set_ip(host);
        }
        if let Some(dir) = &self.store_dir {
            config.store_dir = Some(dir.clone());
        }
        if let Some(path) = &self.blueprints {
            config.blueprints = Some(path.clone());
        }
        config.request_timeout = std::time::Duration::from_secs(self.request_timeout_secs);
        config
    }
}

pub async fn cmd_serve(args: &ServeArgs) -> Result<()> {
    setup_logging();

    let config = args.config()?;
    let host = Arc::new(GrainHost::from_config(&config).context("start grain host")?);
    let listener = http::bind(config.bind).await?;

    let (shutdown_tx, _) = broadcast::channel(1);

    // Handle Ctrl-C and SIGTERM for graceful shutdown
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut term =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down...");
            }
            _ = async {
                if let Some(ref mut t) = term { t.recv().await; }
            } => {
                tracing::info!("SIGTERM received, shutting down...");
            }
        }
        let _ = shutdown_tx_clone.send(());
    });

    let server = http::spawn_http_server(listener, Arc::clone(&host), shutdown_tx);
    let served = server.await.context("http server task")?;

    // Grains are terminated after the gateway stops taking requests.
    host.shutdown().await.context("shut down grains")?;
    served?;
    Ok(())
}

/// Set up tracing subscriber for daemon logging. `RUST_LOG` overrides the
/// default `info` level.
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
