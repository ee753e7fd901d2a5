//! Traffic Director
//!
//! An in-process request load balancer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http server ──▶ proxy ──┬─▶ session (sticky lookup)
//!                                              └─▶ load_balancer (registry + engine)
//!                                                        │
//!     Client Response                                    ▼
//!     ◀─────────────── http server ◀── proxy ◀──── instance (timeout, failover)
//!
//!     Background: health monitor ─▶ registry      admin API ─▶ status, scaling advice
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use traffic_director::config::{self, watcher::ConfigWatcher, LbConfig};
use traffic_director::lifecycle::{bootstrap, signals, Shutdown};
use traffic_director::observability::{logging, metrics};
use traffic_director::{admin, HttpServer};

#[derive(Parser)]
#[command(name = "traffic-director")]
#[command(about = "Request load balancer with health checks, failover and sticky sessions", long_about = None)]
struct Args {
    /// TOML config file. Defaults plus environment overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::finalize(LbConfig::default(), |name| std::env::var(name).ok())?,
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "traffic-director starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = bootstrap(&config).await?;
    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(shutdown.clone());

    // Keep the watcher alive for the life of the process.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        Some(tokio::spawn(admin::serve(listener, state.clone(), shutdown.subscribe())))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        algorithm = config.balancer.algorithm.as_str(),
        "Listening for connections"
    );

    let server = HttpServer::new(state, config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    if let Some(task) = admin_task {
        task.await??;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
