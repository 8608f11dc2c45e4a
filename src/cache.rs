// SPDX-License-Identifier: MPL-2.0

//! Bounded in-memory cache of decoded animations.
//!
//! [`FrameCache`] holds two independently bounded LRU stores: one for frame
//! sequences played by a driver, and one for composited animations. Raw
//! sequences hold many full-size bitmaps, so their store is kept small.
//!
//! The cache is shared between views as an `Arc<FrameCache>`. Each store sits
//! behind its own mutex and is safe to use from worker threads.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use lru::LruCache;
use tracing::debug;

use crate::{
    animated::{AnimatedImage, FrameSequence},
    error::CacheMiss,
};

/// Default capacity of the frame-sequence store.
pub const FRAME_CAPACITY: usize = 3;
/// Default capacity of the composited-animation store.
pub const COMPOSITE_CAPACITY: usize = 40;

/// Hit and miss counters of one store.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

/// A string-keyed LRU map with a fixed entry count.
///
/// Recency follows the `lru` crate: inserts and successful `get`s mark an entry
/// as most recently used; `contains` does not.
#[derive(Debug)]
pub struct BoundedStore<V> {
    name: &'static str,
    entries: Mutex<LruCache<String, V>>,
    stats: CacheStats,
}

impl<V: Clone> BoundedStore<V> {
    /// Create a store holding at most `capacity` entries (at least one).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            stats: CacheStats::default(),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, LruCache<String, V>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace `key`, evicting the least recently used entry when full.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let evicted = self.entries().push(key.clone(), value);

        match evicted {
            Some((old, _)) if old != key => {
                debug!(store = self.name, key = %key, evicted = %old, "cache insert evicted entry");
            }
            Some(_) => debug!(store = self.name, key = %key, "cache entry replaced"),
            None => debug!(store = self.name, key = %key, "cache insert"),
        }
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &str) -> Result<V, CacheMiss> {
        let value = self.entries().get(key).cloned();
        match value {
            Some(value) => {
                self.stats.record_hit();
                debug!(store = self.name, key, "cache hit");
                Ok(value)
            }
            None => {
                self.stats.record_miss();
                debug!(store = self.name, key, "cache miss");
                Err(CacheMiss(key.to_owned()))
            }
        }
    }

    /// Whether `key` is resident. Does not affect recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains(key)
    }

    pub fn remove(&self, key: &str) {
        if self.entries().pop(key).is_some() {
            debug!(store = self.name, key, "cache entry removed");
        }
    }

    pub fn remove_all(&self) {
        let mut entries = self.entries();
        let count = entries.len();
        entries.clear();
        debug!(store = self.name, count, "cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Process-wide cache of decoded animations.
#[derive(Debug)]
pub struct FrameCache {
    frames: BoundedStore<FrameSequence>,
    composites: BoundedStore<Arc<AnimatedImage>>,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCache {
    pub fn new() -> Self {
        Self::with_capacities(FRAME_CAPACITY, COMPOSITE_CAPACITY)
    }

    pub fn with_capacities(frames: usize, composites: usize) -> Self {
        debug!(frames, composites, "FrameCache created");
        Self {
            frames: BoundedStore::new("frames", frames),
            composites: BoundedStore::new("composites", composites),
        }
    }

    /// Store of frame sequences for tick-driven playback.
    pub fn frames(&self) -> &BoundedStore<FrameSequence> {
        &self.frames
    }

    /// Store of composited animations.
    pub fn composites(&self) -> &BoundedStore<Arc<AnimatedImage>> {
        &self.composites
    }

    /// Empty both stores.
    pub fn remove_all(&self) {
        self.frames.remove_all();
        self.composites.remove_all();
    }
}
