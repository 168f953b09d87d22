//! In-memory content cache with conditional gzip.
//!
//! # Data Flow
//! ```text
//! load(path, file, compressible, bypass)
//!     → entries hit (no bypass)      → Lookup::Hit
//!     → in-flight fetch for key      → join it
//!     → otherwise start a fetch:
//!         source.rs (read file) → compress.rs (gzip if worthwhile)
//!         → write entry → release in-flight slot → Lookup::Fetched
//! ```
//!
//! # Design Decisions
//! - Concurrent misses for one key share a single fetch
//! - Bypass requests always fetch on their own and overwrite the entry
//! - Failed fetches never touch the cache
//! - A fetch nobody waits for any more is cancelled, including its gzip pass
//! - Entries are never evicted; only a bypass replaces them
//! - Every fetch takes a generation when it starts; a write never replaces an
//!   entry from a younger fetch

pub mod compress;
pub mod entry;
pub mod error;
pub mod source;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::compress::{CompressError, Compressor, Gzip};
use crate::observability::metrics;

pub use entry::{CacheEntry, CacheKey};
pub use error::FetchError;
pub use source::{ContentSource, FsSource};

type FetchFuture = BoxFuture<'static, Result<Arc<CacheEntry>, FetchError>>;

/// Outcome of a successful [`ContentCache::load`].
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Served from a previously stored entry.
    Hit(Arc<CacheEntry>),
    /// Read from the source during this request (or one it joined).
    Fetched(Arc<CacheEntry>),
}

impl Lookup {
    pub fn entry(&self) -> &Arc<CacheEntry> {
        match self {
            Lookup::Hit(entry) | Lookup::Fetched(entry) => entry,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

/// Counters describing cache behavior since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub reads: u64,
    pub compressions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    reads: AtomicU64,
    compressions: AtomicU64,
}

struct InFlight {
    id: u64,
    fetch: WeakShared<FetchFuture>,
}

/// A stored entry and the generation of the fetch (or `set`) that wrote it.
struct Stored {
    generation: u64,
    entry: Arc<CacheEntry>,
}

struct CacheInner {
    entries: DashMap<CacheKey, Stored>,
    in_flight: DashMap<CacheKey, InFlight>,
    source: Arc<dyn ContentSource>,
    compressor: Arc<dyn Compressor>,
    counters: Counters,
    next_generation: AtomicU64,
}

/// Process-wide map from request path to fetched, optionally gzipped bytes.
///
/// Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct ContentCache {
    inner: Arc<CacheInner>,
}

impl ContentCache {
    /// Create an empty cache reading through `source` and gzipping with flate2.
    pub fn new(source: impl ContentSource) -> Self {
        Self::with_compressor(source, Gzip)
    }

    pub fn with_compressor(source: impl ContentSource, compressor: impl Compressor) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                source: Arc::new(source),
                compressor: Arc::new(compressor),
                counters: Counters::default(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn has(&self, path: &str) -> bool {
        self.inner.entries.contains_key(&CacheKey::new(path))
    }

    pub fn get(&self, path: &str) -> Option<Arc<CacheEntry>> {
        self.inner.stored(&CacheKey::new(path))
    }

    /// Store an entry, replacing any previous one for the same key.
    pub fn set(&self, path: &str, data: Bytes, compressed: bool, source: impl Into<PathBuf>) {
        let entry = CacheEntry {
            data,
            compressed,
            source: source.into(),
        };
        let generation = self.inner.next_generation();
        self.inner.store(CacheKey::new(path), generation, Arc::new(entry));
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            reads: c.reads.load(Ordering::Relaxed),
            compressions: c.compressions.load(Ordering::Relaxed),
        }
    }

    /// Serve `path` from the cache, fetching `file` when needed.
    ///
    /// With `bypass` set the entry is always re-read from the source and
    /// overwritten.
    pub async fn load(
        &self,
        path: &str,
        file: &Path,
        compressible: bool,
        bypass: bool,
    ) -> Result<Lookup, FetchError> {
        let key = CacheKey::new(path);
        let counters = &self.inner.counters;

        if !bypass {
            if let Some(entry) = self.inner.stored(&key) {
                counters.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("hit");
                return Ok(Lookup::Hit(entry));
            }
        }

        counters.misses.fetch_add(1, Ordering::Relaxed);

        if bypass {
            metrics::record_cache_lookup("bypass");
            let generation = self.inner.next_generation();
            let entry = Arc::clone(&self.inner)
                .fetch(key, generation, file.to_path_buf(), compressible)
                .await?;
            return Ok(Lookup::Fetched(entry));
        }

        metrics::record_cache_lookup("miss");
        match self.inner.join_or_start(&key, file, compressible) {
            Joined::Stored(entry) => Ok(Lookup::Hit(entry)),
            Joined::Fetch(fetch) => fetch.await.map(Lookup::Fetched),
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(FsSource)
    }
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("entries", &self.inner.entries.len())
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

enum Joined {
    Stored(Arc<CacheEntry>),
    Fetch(Shared<FetchFuture>),
}

impl CacheInner {
    fn join_or_start(self: &Arc<Self>, key: &CacheKey, file: &Path, compressible: bool) -> Joined {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                if let Some(fetch) = slot.get().fetch.upgrade() {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(key = %key, "Joined in-flight fetch");
                    return Joined::Fetch(fetch);
                }
                // Every waiter of the previous fetch dropped it.
                if let Some(entry) = self.stored(key) {
                    return Joined::Stored(entry);
                }
                let (flight, fetch) = self.start(key.clone(), file.to_path_buf(), compressible);
                if let Some(flight) = flight {
                    slot.insert(flight);
                }
                Joined::Fetch(fetch)
            }
            Entry::Vacant(slot) => {
                // A fetch that finished between the caller's miss and this
                // point has already written its entry.
                if let Some(entry) = self.stored(key) {
                    return Joined::Stored(entry);
                }
                let (flight, fetch) = self.start(key.clone(), file.to_path_buf(), compressible);
                if let Some(flight) = flight {
                    slot.insert(flight);
                }
                Joined::Fetch(fetch)
            }
        }
    }

    fn stored(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|r| Arc::clone(&r.value().entry))
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Write `entry` unless a younger generation already stored one.
    /// Returns the entry left in the map.
    fn store(&self, key: CacheKey, generation: u64, entry: Arc<CacheEntry>) -> Arc<CacheEntry> {
        let kept = match self.entries.entry(key) {
            Entry::Occupied(slot) if slot.get().generation > generation => {
                tracing::debug!(
                    key = %slot.key(),
                    generation,
                    stored = slot.get().generation,
                    "Skipping write from a superseded fetch"
                );
                Arc::clone(&slot.get().entry)
            }
            Entry::Occupied(mut slot) => {
                slot.insert(Stored { generation, entry: Arc::clone(&entry) });
                entry
            }
            Entry::Vacant(slot) => {
                slot.insert(Stored { generation, entry: Arc::clone(&entry) });
                entry
            }
        };
        metrics::record_cache_size(self.entries.len());
        kept
    }

    fn start(
        self: &Arc<Self>,
        key: CacheKey,
        file: PathBuf,
        compressible: bool,
    ) -> (Option<InFlight>, Shared<FetchFuture>) {
        let id = self.next_generation();
        let inner = Arc::clone(self);

        let fetch: FetchFuture = Box::pin(async move {
            let result = Arc::clone(&inner).fetch(key.clone(), id, file, compressible).await;
            inner.in_flight.remove_if(&key, |_, flight| flight.id == id);
            result
        });
        let fetch = fetch.shared();
        let flight = fetch.downgrade().map(|weak| InFlight { id, fetch: weak });

        (flight, fetch)
    }

    /// Read, maybe compress, and store. Dropping the returned future cancels
    /// the read and any running gzip pass.
    async fn fetch(
        self: Arc<Self>,
        key: CacheKey,
        generation: u64,
        file: PathBuf,
        compressible: bool,
    ) -> Result<Arc<CacheEntry>, FetchError> {
        let cancel = CancellationToken::new();
        let _cancel_on_drop = cancel.clone().drop_guard();

        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        let raw = self.source.read(&file, &cancel).await?;

        let (data, compressed) = if compressible {
            self.counters.compressions.fetch_add(1, Ordering::Relaxed);
            match self.compressor.compress(raw.clone(), cancel.clone()).await {
                Ok(zipped) => (zipped, true),
                Err(CompressError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        file = %file.display(),
                        error = %e,
                        "Compression failed, storing raw bytes"
                    );
                    (raw, false)
                }
            }
        } else {
            (raw, false)
        };

        let entry = Arc::new(CacheEntry {
            data,
            compressed,
            source: file,
        });
        tracing::debug!(
            key = %key,
            generation,
            bytes = entry.data.len(),
            compressed = entry.compressed,
            "Cache entry fetched"
        );

        Ok(self.store(key, generation, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Source that counts reads and serves a fixed body after a delay.
    #[derive(Clone)]
    struct SlowSource {
        reads: Arc<AtomicUsize>,
        last_token: Arc<Mutex<Option<CancellationToken>>>,
        delay: Duration,
        body: &'static [u8],
    }

    impl SlowSource {
        fn new(body: &'static [u8], delay: Duration) -> Self {
            Self {
                reads: Arc::new(AtomicUsize::new(0)),
                last_token: Arc::new(Mutex::new(None)),
                delay,
                body,
            }
        }
    }

    impl ContentSource for SlowSource {
        fn read<'a>(
            &'a self,
            file: &'a Path,
            cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<Bytes, FetchError>> {
            Box::pin(async move {
                self.reads.fetch_add(1, Ordering::SeqCst);
                *self.last_token.lock().unwrap() = Some(cancel.clone());
                tokio::select! {
                    _ = cancel.cancelled() => Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(self.delay) => {
                        if self.body.is_empty() {
                            Err(FetchError::EmptyRead(file.to_path_buf()))
                        } else {
                            Ok(Bytes::from_static(self.body))
                        }
                    }
                }
            })
        }
    }

    const CSS: &[u8] = b"body { margin: 0; padding: 0; } body { margin: 0; padding: 0; }";

    #[test]
    fn set_get_has() {
        let cache = ContentCache::default();
        assert!(!cache.has("/a.css"));
        assert!(cache.get("/a.css").is_none());

        cache.set("/a.css", Bytes::from_static(b"x"), false, "/srv/a.css");
        assert!(!cache.has("/A.CSS"));
        let entry = cache.get("/a.css").unwrap();
        assert_eq!(&entry.data[..], b"x");
        assert!(!entry.compressed);

        cache.set("/a.css", Bytes::from_static(b"y"), true, "/srv/a.css");
        assert_eq!(&cache.get("/a.css").unwrap().data[..], b"y");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn first_load_fetches_then_hits() {
        let source = SlowSource::new(CSS, Duration::from_millis(1));
        let cache = ContentCache::new(source.clone());
        let file = Path::new("/srv/site.css");

        let first = cache.load("/site.css", file, true, false).await.unwrap();
        assert!(!first.is_hit());
        assert!(first.entry().compressed);

        let second = cache.load("/site.css", file, true, false).await.unwrap();
        assert!(second.is_hit());
        assert_eq!(first.entry().data, second.entry().data);

        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.compressions, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let source = SlowSource::new(CSS, Duration::from_millis(50));
        let cache = ContentCache::new(source.clone());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .load("/site.css", Path::new("/srv/site.css"), true, false)
                    .await
                    .unwrap()
            }));
        }

        let mut bodies = Vec::new();
        for task in tasks {
            bodies.push(task.await.unwrap().entry().data.clone());
        }

        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().compressions, 1);
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn bypass_always_reads_and_overwrites() {
        let source = SlowSource::new(CSS, Duration::from_millis(1));
        let cache = ContentCache::new(source.clone());
        let file = Path::new("/srv/site.css");

        cache.set("/site.css", Bytes::from_static(b"stale"), false, file);

        for _ in 0..3 {
            let fetched = cache.load("/site.css", file, true, true).await.unwrap();
            assert!(!fetched.is_hit());
        }

        assert_eq!(source.reads.load(Ordering::SeqCst), 3);
        let entry = cache.get("/site.css").unwrap();
        assert!(entry.compressed);
        assert_ne!(&entry.data[..], b"stale");
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_untouched() {
        let source = SlowSource::new(b"", Duration::from_millis(1));
        let cache = ContentCache::new(source);

        let err = cache
            .load("/empty.css", Path::new("/srv/empty.css"), true, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyRead(_)));
        assert!(!cache.has("/empty.css"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn incompressible_entry_is_not_flagged() {
        let source = SlowSource::new(b"\x89PNG....", Duration::from_millis(1));
        let cache = ContentCache::new(source);

        let fetched = cache
            .load("/logo.png", Path::new("/srv/logo.png"), false, false)
            .await
            .unwrap();
        assert!(!fetched.entry().compressed);
        assert_eq!(&fetched.entry().data[..], b"\x89PNG....");
        assert_eq!(cache.stats().compressions, 0);
    }

    #[tokio::test]
    async fn abandoned_fetch_is_cancelled_and_restartable() {
        let source = SlowSource::new(CSS, Duration::from_secs(60));
        let cache = ContentCache::new(source.clone());

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .load("/slow.css", Path::new("/srv/slow.css"), true, false)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;

        let token = source.last_token.lock().unwrap().clone().unwrap();
        assert!(token.is_cancelled());
        assert!(!cache.has("/slow.css"));

        // The dead in-flight slot does not block a new fetch.
        let _ = tokio::time::timeout(
            Duration::from_millis(50),
            cache.load("/slow.css", Path::new("/srv/slow.css"), true, false),
        )
        .await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    /// Compressor that always fails with an I/O error.
    struct BrokenCompressor;

    impl Compressor for BrokenCompressor {
        fn compress(
            &self,
            _data: Bytes,
            _cancel: CancellationToken,
        ) -> BoxFuture<'static, Result<Bytes, CompressError>> {
            Box::pin(async {
                Err(CompressError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "encoder exploded",
                )))
            })
        }
    }

    #[tokio::test]
    async fn failed_compression_stores_raw_unflagged() {
        let source = SlowSource::new(CSS, Duration::from_millis(1));
        let cache = ContentCache::with_compressor(source, BrokenCompressor);

        let fetched = cache
            .load("/site.css", Path::new("/srv/site.css"), true, false)
            .await
            .unwrap();
        assert!(!fetched.entry().compressed);
        assert_eq!(&fetched.entry().data[..], CSS);

        let stored = cache.get("/site.css").unwrap();
        assert!(!stored.compressed);
        assert_eq!(&stored.data[..], CSS);
        assert_eq!(cache.stats().compressions, 1);
    }

    /// Serves each read's body after its own delay, in call order.
    struct ScriptedSource {
        reads: AtomicUsize,
        script: Vec<(Duration, &'static [u8])>,
    }

    impl ContentSource for ScriptedSource {
        fn read<'a>(
            &'a self,
            _file: &'a Path,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<Bytes, FetchError>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            let (delay, body) = self.script[n.min(self.script.len() - 1)];
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(Bytes::from_static(body))
            })
        }
    }

    #[tokio::test]
    async fn bypass_outlives_older_in_flight_fetch() {
        let source = ScriptedSource {
            reads: AtomicUsize::new(0),
            script: vec![
                (Duration::from_millis(150), b"old".as_slice()),
                (Duration::from_millis(1), b"new".as_slice()),
            ],
        };
        let cache = ContentCache::new(source);
        let file = Path::new("/srv/data.bin");

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.load("/data.bin", Path::new("/srv/data.bin"), false, false).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let bypass = cache.load("/data.bin", file, false, true).await.unwrap();
        assert_eq!(&bypass.entry().data[..], b"new");

        // The older fetch finishes last but does not overwrite the newer bytes.
        let joined = slow.await.unwrap().unwrap();
        assert_eq!(&joined.entry().data[..], b"new");
        assert_eq!(&cache.get("/data.bin").unwrap().data[..], b"new");

        // A later write still replaces the entry.
        cache.set("/data.bin", Bytes::from_static(b"newest"), false, file);
        assert_eq!(&cache.get("/data.bin").unwrap().data[..], b"newest");
    }
}
