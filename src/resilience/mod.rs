//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Registrar connection lost:
//!     → backoff.rs (exponential delay with jitter)
//!     → reconnect attempt
//! ```
//!
//! # Design Decisions
//! - The request path never retries; only the background connection does
//! - The query deadline lives with the registrar itself

pub mod backoff;
