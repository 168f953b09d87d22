//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (registrar connection, metrics)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;

use crate::cache::ContentCache;
use crate::config::GatewayConfig;
use crate::http::{Dispatcher, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::net::tls::{load_tls_config, TlsError};
use crate::observability::metrics;
use crate::registrar::Registrar;

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Run the gateway until a shutdown signal arrives.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    tokio::spawn(signals::watch_signals(shutdown.clone()));
    serve(config, shutdown).await
}

/// Run the gateway until `shutdown` fires.
pub async fn serve(config: GatewayConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let addr: SocketAddr = config
        .listener
        .bind_address
        .parse()
        .map_err(|_| StartupError::BindAddress(config.listener.bind_address.clone()))?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(metrics_addr) => metrics::init_metrics(metrics_addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tls = match &config.listener.tls {
        Some(tls) => Some(load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?),
        None => None,
    };

    if !Path::new(&config.content.public_dir).is_dir() {
        tracing::warn!(
            public_dir = %config.content.public_dir,
            "Public directory does not exist; static requests will 404"
        );
    }

    let registrar = Registrar::spawn(&config.registrar, shutdown.subscribe());
    let dispatcher = Dispatcher::new(&config, ContentCache::default(), registrar);
    let server = HttpServer::new(config, dispatcher);

    match tls {
        Some(tls) => server.run_tls(addr, tls, shutdown.subscribe()).await?,
        None => {
            tracing::warn!("No TLS configured, serving plaintext");
            let listener = TcpListener::bind(addr).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    // Stop the registrar task if the server ended on its own.
    shutdown.trigger();
    Ok(())
}
