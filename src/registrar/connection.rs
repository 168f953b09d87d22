//! Background task that owns the registrar socket.
//!
//! # Responsibilities
//! - Connect to the Unix socket, reconnect with backoff when it drops
//! - Write queued query lines
//! - Read reply lines and hand them to the pending table
//!
//! # Connection States
//! ```text
//! Connecting → Connected → (closed / io error) → Backoff → Connecting
//!                 └─────── shutdown ───────→ Stopped
//! ```

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{broadcast, mpsc};

use crate::registrar::RegistrarInner;
use crate::resilience::backoff::Backoff;

/// Drives the socket behind a [`Registrar`](crate::registrar::Registrar).
pub struct RegistrarConnection {
    inner: Arc<RegistrarInner>,
    outbound: mpsc::Receiver<Bytes>,
    backoff: Backoff,
}

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    Closed,
    Io(std::io::Error),
}

impl RegistrarConnection {
    pub(crate) fn new(
        inner: Arc<RegistrarInner>,
        outbound: mpsc::Receiver<Bytes>,
        backoff: Backoff,
    ) -> Self {
        Self { inner, outbound, backoff }
    }

    /// Keep the socket connected until shutdown.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let path = self.inner.socket_path.clone();
        tracing::info!(socket = %path.display(), "Registrar connection task starting");

        loop {
            let connect = tokio::select! {
                _ = shutdown.recv() => break,
                result = UnixStream::connect(&path) => result,
            };

            match connect {
                Ok(stream) => {
                    self.backoff.reset();
                    self.discard_stale();
                    self.inner.set_connected(true);
                    tracing::info!(socket = %path.display(), "Registrar connected");

                    let end = self.session(stream, &mut shutdown).await;

                    self.inner.set_connected(false);
                    self.inner.fail_pending();

                    match end {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed => {
                            tracing::warn!(socket = %path.display(), "Registrar closed the connection");
                        }
                        SessionEnd::Io(e) => {
                            tracing::warn!(socket = %path.display(), error = %e, "Registrar connection failed");
                        }
                    }
                }
                Err(e) => {
                    let attempt = self.backoff.attempts() + 1;
                    if attempt == 1 {
                        tracing::warn!(socket = %path.display(), error = %e, "Registrar unavailable, retrying");
                    } else {
                        tracing::debug!(socket = %path.display(), attempt, error = %e, "Registrar connect failed");
                    }
                }
            }

            let delay = self.backoff.next_delay();
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.inner.set_connected(false);
        self.inner.fail_pending();
        tracing::info!("Registrar connection task stopped");
    }

    /// Drop lines queued while no socket was up; their waiters already failed.
    fn discard_stale(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded stale registrar queries");
        }
    }

    async fn session(
        &mut self,
        stream: UnixStream,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> SessionEnd {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        loop {
            tokio::select! {
                _ = shutdown.recv() => return SessionEnd::Shutdown,
                line = self.outbound.recv() => match line {
                    Some(line) => {
                        if let Err(e) = write.write_all(&line).await {
                            return SessionEnd::Io(e);
                        }
                    }
                    None => return SessionEnd::Shutdown,
                },
                reply = lines.next_line() => match reply {
                    Ok(Some(reply)) => self.inner.deliver(&reply),
                    Ok(None) => return SessionEnd::Closed,
                    Err(e) => return SessionEnd::Io(e),
                },
            }
        }
    }
}
