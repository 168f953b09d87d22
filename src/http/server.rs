//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the single gateway handler
//! - Wire up middleware (request ID, tracing)
//! - Serve over TLS (h2 + http/1.1) or plaintext
//! - Classify each request and hand it to the dispatcher
//! - Graceful shutdown on the broadcast signal

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    response::Response,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::dispatch::Dispatcher;
use crate::http::request::{self, MakeRequestUuidV4};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::routing::Classifier;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<Classifier>,
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP front of the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a server dispatching through `dispatcher`.
    pub fn new(config: GatewayConfig, dispatcher: Dispatcher) -> Self {
        let state = AppState {
            classifier: Arc::new(Classifier::new(
                &config.content.public_dir,
                config.listener.server_name.clone(),
            )),
            dispatcher: Arc::new(dispatcher),
        };

        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %req.method(),
                            uri = %req.uri(),
                            version = ?req.version(),
                            request_id = %request::request_id(req),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve plaintext HTTP/1.1 and h2c on `listener`.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, tls = false, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS (h2 negotiated via ALPN) on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, tls = true, "HTTP server starting");

        let handle = axum_server::Handle::new();
        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        {
            let handle = handle.clone();
            tokio::spawn(async move {
                shutdown::wait(shutdown).await;
                handle.graceful_shutdown(Some(grace));
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Classify the request and dispatch it.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    // h2 carries `:authority` in the URI; h1 sends a Host header.
    let host = request.uri().authority().map(|a| a.as_str()).or_else(|| {
        request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
    });

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let descriptor = state.classifier.classify(target, host, client);

    tracing::debug!(
        path = %descriptor.path,
        route = descriptor.route.label(),
        client = ?descriptor.client,
        "Request classified"
    );

    let response = state.dispatcher.dispatch(&descriptor).await;

    metrics::record_request(descriptor.route.label(), response.status().as_u16(), start_time);

    response
}
