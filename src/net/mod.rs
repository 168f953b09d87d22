//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (rustls handshake, ALPN h2 / http/1.1)
//!     → Hand off to HTTP layer (one stream per request on h2)
//! ```
//!
//! # Design Decisions
//! - TLS material is validated before the listener binds
//! - TLS is optional; plaintext serves HTTP/1.1 and h2c

pub mod tls;
