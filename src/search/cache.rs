use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use serde::Serialize;
use crate::context::kwic::Kwics;
use crate::core::error::Result;
use crate::core::types::ContextSize;

/// Kwics of one result set, keyed by context size
pub struct KwicsCache {
    cache: Mutex<LruCache<ContextSize, Arc<Kwics>>>,
    lookups: AtomicUsize,
    reused: AtomicUsize,
}

impl KwicsCache {
    pub fn new(size_limit: usize) -> Self {
        let cap = NonZeroUsize::new(size_limit).unwrap_or(NonZeroUsize::MIN);
        KwicsCache {
            cache: Mutex::new(LruCache::new(cap)),
            lookups: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }

    /// Cached kwics, or build and cache them. The build runs outside the lock,
    /// so two callers racing on one size may both build; the last one is kept.
    pub fn get_or_try_insert<F>(&self, size: ContextSize, build: F) -> Result<Arc<Kwics>>
    where
        F: FnOnce() -> Result<Kwics>,
    {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if let Some(kwics) = self.cache.lock().get(&size).cloned() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(kwics);
        }
        let kwics = Arc::new(build()?);
        self.cache.lock().put(size, kwics.clone());
        Ok(kwics)
    }

    pub fn stats(&self) -> KwicsCacheStats {
        let cache = self.cache.lock();
        KwicsCacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            cached_sizes: cache.len(),
            capacity: cache.cap().get(),
        }
    }
}

/// Kwics cache usage for one result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KwicsCacheStats {
    pub lookups: usize,
    /// Lookups answered without building
    pub reused: usize,
    pub cached_sizes: usize,
    pub capacity: usize,
}

impl KwicsCacheStats {
    pub fn builds(&self) -> usize {
        self.lookups - self.reused
    }

    /// Share of lookups answered from the cache; 0 before the first lookup
    pub fn reuse_ratio(&self) -> f64 {
        match self.lookups {
            0 => 0.0,
            lookups => self.reused as f64 / lookups as f64,
        }
    }
}
