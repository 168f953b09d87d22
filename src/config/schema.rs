//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Static content and cache settings.
    pub content: ContentConfig,

    /// Inter-process query bridge settings.
    pub registrar: RegistrarConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration. Plaintext HTTP/1.1 + h2c when absent.
    pub tls: Option<TlsConfig>,

    /// Host used in redirect targets when a request carries no authority.
    pub server_name: String,

    /// Seconds to wait for in-flight requests on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            server_name: "localhost".to_string(),
            shutdown_grace_secs: 10,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Static content configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory static files are served from.
    pub public_dir: String,

    /// Query key that forces a cache refresh when given a non-empty value.
    pub bypass_param: String,

    /// `max-age` advertised when serving from the cache.
    pub cached_max_age: u32,

    /// `max-age` advertised right after a fetch.
    pub fresh_max_age: u32,

    /// Fixed `last-modified` header value.
    pub last_modified: String,

    /// Title rendered into the index page.
    pub index_title: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            public_dir: "./public".to_string(),
            bypass_param: "nocache".to_string(),
            cached_max_age: 300,
            fresh_max_age: 30,
            last_modified: "Fri, 29 Nov 1974 12:26:08 GMT".to_string(),
            index_title: "edge-gateway".to_string(),
        }
    }
}

/// Query bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// Unix socket the backend process listens on.
    pub socket_path: String,

    /// Topic used for `/api/app/` requests.
    pub app_topic: String,

    /// Deadline for a single query in milliseconds.
    pub timeout_ms: u64,

    /// Base delay for reconnect backoff in milliseconds.
    pub reconnect_base_ms: u64,

    /// Maximum delay for reconnect backoff in milliseconds.
    pub reconnect_max_ms: u64,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            socket_path: "./server/sockets/registrar.sock".to_string(),
            app_topic: "api.frontend".to_string(),
            timeout_ms: 10_000,
            reconnect_base_ms: 100,
            reconnect_max_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
