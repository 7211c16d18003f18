//! Result cache.
//!
//! The engine is pure; caching lives behind this trait so callers decide
//! whether and where results are kept.

use crate::engine::PruneReport;
use indexmap::IndexMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Content hash identifying one purge run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash every part in order. Parts are length-prefixed so `("ab", "c")`
    /// and `("a", "bc")` differ.
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize().to_hex().to_string())
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

/// Key-value store for purge results
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<PruneReport>;
    fn put(&self, key: CacheKey, report: PruneReport);
}

/// Entries kept by [`MemoryCache::new`]
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// In-memory cache with hit and miss counters.
///
/// Holds at most `capacity` reports; inserting past that evicts the oldest
/// entry first.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<IndexMap<CacheKey, PruneReport>>,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<PruneReport> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(report) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(report.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: CacheKey, report: PruneReport) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(&key) {
            while entries.len() >= self.capacity {
                entries.shift_remove_index(0);
            }
        }
        entries.insert(key, report);
    }
}
