//! Cache keys and entries.

use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;

/// Cache key: the request path exactly as sent, without query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(path: &str) -> Self {
        let path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        Self(path.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached payload.
///
/// `compressed` always describes the encoding of `data`: it is only set when
/// the gzip pass actually succeeded.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub compressed: bool,
    /// File the payload was read from. Informational only.
    pub source: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_query_but_keeps_case() {
        assert_ne!(CacheKey::new("/CSS/Site.css"), CacheKey::new("/css/site.css"));
        assert_eq!(CacheKey::new("/a.js?v=2"), CacheKey::new("/a.js"));
        assert_eq!(CacheKey::new("/a.js").as_str(), "/a.js");
    }
}
