//! Where cached content comes from.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::cache::error::FetchError;

/// Reads the full content of a static file.
///
/// Implementations must distinguish a missing/unreadable file
/// ([`FetchError::FileUnavailable`]) from an empty one
/// ([`FetchError::EmptyRead`]) and stop early once `cancel` fires.
pub trait ContentSource: Send + Sync + 'static {
    fn read<'a>(
        &'a self,
        file: &'a Path,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// Reads from the local file system with `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl ContentSource for FsSource {
    fn read<'a>(
        &'a self,
        file: &'a Path,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(read_file(file, cancel))
    }
}

async fn read_file(file: &Path, cancel: &CancellationToken) -> Result<Bytes, FetchError> {
    let mut handle = tokio::fs::File::open(file)
        .await
        .map_err(|e| FetchError::unavailable(file, e))?;

    let size = handle
        .metadata()
        .await
        .map_err(|e| FetchError::unavailable(file, e))?
        .len();

    let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        read = handle.read_to_end(&mut buf) => {
            read.map_err(|e| FetchError::unavailable(file, e))?;
        }
    }

    if buf.is_empty() {
        return Err(FetchError::EmptyRead(file.to_path_buf()));
    }

    Ok(Bytes::from(buf))
}
