//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request target ("/path?query"), host, client address
//!     → query.rs (naive key/value split)
//!     → classifier.rs (strict-priority prefix matching)
//!     → mime.rs (MIME lookup + compressibility)
//!     → Return: RouteDescriptor with exactly one RouteKind
//! ```
//!
//! # Design Decisions
//! - Classification is pure and infallible
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always yields the same route
//! - First match wins (fixed priority order)

pub mod classifier;
pub mod mime;
pub mod query;

pub use classifier::{Classifier, RouteDescriptor, RouteKind};
pub use query::{parse_query, QueryMap};
