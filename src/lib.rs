//! TLS-terminating HTTP/2 gateway.
//!
//! Every request is classified once and then either redirected to its
//! canonical URL, served from a gzip-aware in-memory cache, answered by a
//! backend process over a Unix socket, or rejected with 404.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registrar;
pub mod resilience;
pub mod routing;

pub use cache::ContentCache;
pub use config::GatewayConfig;
pub use http::{Dispatcher, HttpServer};
pub use lifecycle::Shutdown;
pub use registrar::Registrar;
