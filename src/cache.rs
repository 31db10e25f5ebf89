use dashmap::DashMap;
use std::sync::Arc;

use crate::models::Link;

/// What the redirect path needs to know about a link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedLink {
    pub id: i64,
    pub original_url: String,
}

impl From<&Link> for CachedLink {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id,
            original_url: link.original_url.clone(),
        }
    }
}

/// Thread-safe in-memory cache mapping short_code -> link id + destination.
///
/// Warmed on startup from the link store and filled in on allocation and on
/// redirect cache misses. Short codes and destinations never change once
/// written, so entries never need invalidating.
#[derive(Clone, Debug)]
pub struct LinkCache {
    inner: Arc<DashMap<String, CachedLink>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    pub fn set(&self, link: &Link) {
        self.inner
            .insert(link.short_code.clone(), CachedLink::from(link));
    }

    /// Look up a short code. Returns a clone of the cached entry if present.
    pub fn get(&self, short_code: &str) -> Option<CachedLink> {
        self.inner.get(short_code).map(|v| v.clone())
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new()
    }
}
