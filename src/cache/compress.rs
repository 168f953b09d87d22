//! Gzip compression off the async threads.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Input is fed to the encoder in slices of this size; cancellation is
/// checked between slices.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("gzip failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("compression cancelled")]
    Cancelled,
    #[error("compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Encodes a fetched payload before it is stored.
///
/// The output must be gzip; the cache flags entries it produced as
/// `Content-Encoding: gzip`.
pub trait Compressor: Send + Sync + 'static {
    fn compress(&self, data: Bytes, cancel: CancellationToken) -> BoxFuture<'static, Result<Bytes, CompressError>>;
}

/// flate2 gzip at the default level, run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gzip;

impl Compressor for Gzip {
    fn compress(&self, data: Bytes, cancel: CancellationToken) -> BoxFuture<'static, Result<Bytes, CompressError>> {
        Box::pin(gzip(data, cancel))
    }
}

/// Gzip `data` on the blocking pool.
pub async fn gzip(data: Bytes, cancel: CancellationToken) -> Result<Bytes, CompressError> {
    tokio::task::spawn_blocking(move || gzip_blocking(&data, &cancel)).await?
}

pub(crate) fn gzip_blocking(data: &[u8], cancel: &CancellationToken) -> Result<Bytes, CompressError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());

    for chunk in data.chunks(CHUNK_SIZE) {
        if cancel.is_cancelled() {
            return Err(CompressError::Cancelled);
        }
        encoder.write_all(chunk)?;
    }

    Ok(Bytes::from(encoder.finish()?))
}
