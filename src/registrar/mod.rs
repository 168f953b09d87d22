//! Inter-process query bridge.
//!
//! # Data Flow
//! ```text
//! Registrar::query(topic, payload, timeout)
//!     → fresh correlation id, pending entry with deadline
//!     → envelope.rs (one JSON line) → outbound channel
//!     → connection.rs writes it to the Unix socket
//!     ...
//! connection.rs reads reply line
//!     → envelope.rs decode
//!     → pending entry for id? resolve waiter : drop as late/unknown
//! ```
//!
//! # Design Decisions
//! - One persistent socket, reconnected in the background with backoff
//! - Queries fail fast while the socket is down
//! - A waiter always removes its own pending entry, whatever the outcome
//! - Losing the socket fails every pending query at once

pub mod connection;
pub mod envelope;

use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::config::RegistrarConfig;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

pub use connection::RegistrarConnection;

const OUTBOUND_CAPACITY: usize = 1024;

/// Why a query produced no reply.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("registrar socket is not connected")]
    NotConnected,
    #[error("registrar connection lost before the reply arrived")]
    Disconnected,
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("failed to encode query: {0}")]
    Encode(#[from] serde_json::Error),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::NotConnected => "not_connected",
            QueryError::Disconnected => "disconnected",
            QueryError::Timeout(_) => "timeout",
            QueryError::Encode(_) => "encode",
        }
    }
}

/// A query waiting for its reply.
struct PendingQuery {
    topic: String,
    deadline: Instant,
    reply: oneshot::Sender<Bytes>,
}

pub(crate) struct RegistrarInner {
    socket_path: PathBuf,
    pending: DashMap<u64, PendingQuery>,
    next_id: AtomicU64,
    connected: AtomicBool,
    outbound: mpsc::Sender<Bytes>,
}

/// Client side of the backend query channel.
///
/// Cheap to clone; clones share the pending table and the socket.
#[derive(Clone)]
pub struct Registrar {
    inner: Arc<RegistrarInner>,
}

impl Registrar {
    /// Create a registrar and the connection task that drives its socket.
    ///
    /// Nothing is sent until [`RegistrarConnection::run`] is polled.
    pub fn new(config: &RegistrarConfig) -> (Self, RegistrarConnection) {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let inner = Arc::new(RegistrarInner {
            socket_path: PathBuf::from(&config.socket_path),
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            outbound,
        });

        let connection = RegistrarConnection::new(
            Arc::clone(&inner),
            outbound_rx,
            Backoff::new(config.reconnect_base_ms, config.reconnect_max_ms),
        );

        (Self { inner }, connection)
    }

    /// Create a registrar and spawn its connection task.
    pub fn spawn(config: &RegistrarConfig, shutdown: broadcast::Receiver<()>) -> Self {
        let (registrar, connection) = Self::new(config);
        tokio::spawn(connection.run(shutdown));
        registrar
    }

    pub fn socket_path(&self) -> &Path {
        &self.inner.socket_path
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Queries currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Send `payload` under `topic` and wait up to `timeout` for the reply.
    pub async fn query<P: Serialize + ?Sized>(
        &self,
        topic: &str,
        payload: &P,
        timeout: Duration,
    ) -> Result<Bytes, QueryError> {
        let result = self.query_inner(topic, payload, timeout).await;

        match &result {
            Ok(body) => {
                tracing::debug!(topic = %topic, bytes = body.len(), "Query answered");
                metrics::record_query(topic, "ok");
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Query failed");
                metrics::record_query(topic, e.kind());
            }
        }

        result
    }

    async fn query_inner<P: Serialize + ?Sized>(
        &self,
        topic: &str,
        payload: &P,
        timeout: Duration,
    ) -> Result<Bytes, QueryError> {
        if !self.is_connected() {
            return Err(QueryError::NotConnected);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let line = envelope::encode_query(id, topic, payload)?;
        let deadline = Instant::now() + timeout;

        let rx = self.inner.register(id, topic, deadline)?;
        let _pending = PendingGuard { inner: &self.inner, id };

        let exchange = async {
            self.inner
                .outbound
                .send(line)
                .await
                .map_err(|_| QueryError::NotConnected)?;
            rx.await.map_err(|_| QueryError::Disconnected)
        };

        match tokio::time::timeout_at(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("socket_path", &self.inner.socket_path)
            .field("connected", &self.is_connected())
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

/// Removes a pending entry when its waiter finishes or is dropped.
struct PendingGuard<'a> {
    inner: &'a RegistrarInner,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending.remove(&self.id);
    }
}

impl RegistrarInner {
    /// Add a pending entry for `id`.
    ///
    /// The connection flag is read again after the insert: the connection
    /// task clears the flag before it clears the table, so an entry that
    /// missed the clear always sees the flag down here.
    fn register(
        &self,
        id: u64,
        topic: &str,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<Bytes>, QueryError> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingQuery {
                topic: topic.to_string(),
                deadline,
                reply: tx,
            },
        );

        if !self.connected.load(Ordering::Acquire) {
            self.pending.remove(&id);
            return Err(QueryError::NotConnected);
        }
        Ok(rx)
    }

    /// Route one reply line to its waiter.
    pub(crate) fn deliver(&self, line: &str) {
        let reply = match envelope::decode_reply(line) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed registrar reply");
                return;
            }
        };

        match self.pending.remove(&reply.id) {
            Some((id, pending)) if pending.deadline <= Instant::now() => {
                tracing::debug!(id, topic = %pending.topic, "Dropping reply past its deadline");
            }
            Some((id, pending)) => {
                if pending.reply.send(reply.body_bytes()).is_err() {
                    tracing::debug!(id, topic = %pending.topic, "Waiter gone before reply");
                }
            }
            None if reply.id < self.next_id.load(Ordering::Relaxed) => {
                tracing::debug!(id = reply.id, "Dropping late reply");
            }
            None => {
                tracing::warn!(id = reply.id, "Reply for a query that was never sent");
            }
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Fail every waiter; their senders are dropped.
    pub(crate) fn fail_pending(&self) {
        let count = self.pending.len();
        self.pending.clear();
        if count > 0 {
            tracing::warn!(count, "Failed pending queries after connection loss");
        }
    }
}
