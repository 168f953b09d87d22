//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection (h2 stream or h1 request)
//!     → server.rs (Axum setup, middleware, classification)
//!     → request.rs (request ID)
//!     → dispatch.rs (one terminal action per route kind)
//!         → redirect / cache / index.rs / registrar / handlers.rs
//!     → response.rs (status + headers)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod handlers;
pub mod index;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::Dispatcher;
pub use handlers::{ExternalHandlers, UnimplementedHandlers};
pub use index::{IndexPage, PageRenderer, ShellRenderer};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
