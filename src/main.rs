//! edge-gateway
//!
//! A TLS-terminating HTTP/2 gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                     EDGE GATEWAY                     │
//!                         │                                                      │
//!     Client Request      │  ┌─────────┐    ┌─────────┐    ┌────────────┐        │
//!     ────────────────────┼─▶│   net   │───▶│  http   │───▶│  routing   │        │
//!                         │  │   tls   │    │ server  │    │ classifier │        │
//!                         │  └─────────┘    └─────────┘    └─────┬──────┘        │
//!                         │                                      │               │
//!                         │                                      ▼               │
//!                         │                               ┌────────────┐         │
//!                         │                               │  dispatch  │         │
//!                         │                               └──┬──────┬──┘         │
//!                         │                                  │      │            │
//!                         │                      ┌───────────┘      └────────┐   │
//!                         │                      ▼                           ▼   │
//!     Client Response     │               ┌────────────┐            ┌───────────┐│   Backend
//!     ◀───────────────────┼───────────────│   cache    │            │ registrar │◀┼── process
//!                         │               │ (+ gzip)   │            │ (unix ipc)│┼─▶ (socket)
//!                         │               └────────────┘            └───────────┘│
//!                         │                                                      │
//!                         │  ┌────────────────────────────────────────────────┐  │
//!                         │  │            Cross-Cutting Concerns              │  │
//!                         │  │  config · observability · lifecycle · backoff  │  │
//!                         │  └────────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use edge_gateway::config::{load_config, validation::validate_config, GatewayConfig};
use edge_gateway::lifecycle::startup;
use edge_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "TLS-terminating HTTP/2 gateway with a static cache and IPC bridge", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `content.public_dir`.
    #[arg(long)]
    public_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(public_dir) = cli.public_dir {
        config.content.public_dir = public_dir.display().to_string();
    }
    validate_config(&config).map_err(|errors| {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;

    logging::init(&config.observability.log_level);

    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        public_dir = %config.content.public_dir,
        registrar_socket = %config.registrar.socket_path,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
