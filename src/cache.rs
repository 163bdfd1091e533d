//! Memoized BPE results keyed by the byte-encoded pre-token.
//!
//! Entries never expire: the set of distinct pre-tokens in natural-language text
//! is bounded by its vocabulary. A miss computes inside the shard's entry lock, so
//! each key is computed at most once even under concurrent callers.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    /// Equal to the number of merge-engine invocations.
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
pub struct MergeCache {
    entries: Option<DashMap<String, Arc<str>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for MergeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeCache {
    pub fn new() -> Self {
        MergeCache {
            entries: Some(DashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that stores nothing; every lookup computes.
    pub fn disabled() -> Self {
        MergeCache {
            entries: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get_or_compute<F>(&self, token: &str, compute: F) -> Arc<str>
    where
        F: FnOnce(&str) -> String,
    {
        let Some(entries) = &self.entries else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return compute(token).into();
        };

        if let Some(hit) = entries.get(token) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(hit.value());
        }

        match entries.entry(token.to_string()) {
            // Another thread filled it between the read and the entry lock.
            Entry::Occupied(e) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Arc::clone(e.get())
            }
            Entry::Vacant(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let merged: Arc<str> = compute(token).into();
                e.insert(Arc::clone(&merged));
                merged
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
