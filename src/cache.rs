//! Memory-bounded cache of decoded sub-block bitmaps with strict
//! least-recently-used eviction.
//!
//! The cache is the one piece of state shared across concurrent composition
//! requests. Entries are keyed by sub-block identity and ordered by a single
//! monotonically increasing recency counter that every `get` and `add`
//! advances; eviction is caller-triggered via [`SubBlockCache::prune`],
//! nothing evicts implicitly.
//!
//! # Consistency contract
//!
//! - `get` and `add` are per-key atomic: a reader never observes an entry
//!   whose bitmap and recency belong to different updates.
//! - [`SubBlockCache::memory_usage`] and [`SubBlockCache::element_count`] are
//!   independent lock-free reads; [`SubBlockCache::statistics`] returns both
//!   as one consistent snapshot.
//! - Decoding happens outside any cache lock. Two concurrent requests for
//!   the same missing sub-block may both decode it; the last `add` wins and
//!   determines the cached recency. That duplicate work is the documented
//!   trade-off for never blocking the cache on a decoder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::bitmap::Bitmap;
use crate::subblock::SubBlockId;

/// Limits for [`SubBlockCache::prune`]; a limit left `None` is not enforced.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PruneOptions {
    /// Evict until the aggregate bitmap size is at or below this many bytes
    pub max_memory_bytes: Option<u64>,

    /// Evict until at most this many entries remain
    pub max_elements: Option<u32>,
}

/// A consistent snapshot of the cache's aggregate size and entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    /// Sum of `width * height * bytes_per_pixel` over all cached bitmaps
    pub memory_usage_bytes: u64,

    /// Number of cached entries
    pub element_count: u32,
}

struct CacheEntry {
    bitmap: Arc<Bitmap>,
    recency: u64,
}

/// Thread-safe, memory-bounded store of decoded sub-block bitmaps.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use microtile::bitmap::{Bitmap, PixelType};
/// use microtile::cache::{PruneOptions, SubBlockCache};
/// use microtile::subblock::SubBlockId;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = SubBlockCache::new();
///     let bitmap = Arc::new(Bitmap::new(PixelType::Gray8, 16, 16));
///
///     cache.add(SubBlockId(0), bitmap).await;
///     assert!(cache.get(SubBlockId(0)).await.is_some());
///
///     cache.prune(PruneOptions { max_elements: Some(0), ..Default::default() }).await;
///     assert_eq!(cache.element_count(), 0);
/// }
/// ```
#[derive(Default)]
pub struct SubBlockCache {
    entries: RwLock<HashMap<SubBlockId, CacheEntry>>,
    recency_counter: AtomicU64,
    memory_bytes: AtomicU64,
    element_count: AtomicU32,
}

impl SubBlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next recency value; strictly larger than any issued
    /// before on this cache instance, never reset.
    fn next_recency(&self) -> u64 {
        self.recency_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a decoded bitmap.
    ///
    /// A hit refreshes the entry's recency and returns a shared handle (no
    /// copy); a miss returns `None`. Pure lookup: a miss is never turned into
    /// a decode here.
    pub async fn get(&self, id: SubBlockId) -> Option<Arc<Bitmap>> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id)?;
        entry.recency = self.next_recency();
        Some(Arc::clone(&entry.bitmap))
    }

    /// Insert or replace the bitmap for a sub-block.
    ///
    /// On replacement the aggregate memory counter is first debited by the
    /// old entry's size, so the running total never carries a superseded
    /// size. The entry's recency is set to a freshly allocated value.
    pub async fn add(&self, id: SubBlockId, bitmap: Arc<Bitmap>) {
        let new_size = bitmap.size_in_bytes();
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(&id) {
            self.debit_memory(existing.bitmap.size_in_bytes());
        } else {
            self.element_count.fetch_add(1, Ordering::Release);
        }
        self.memory_bytes.fetch_add(new_size, Ordering::Release);

        entries.insert(
            id,
            CacheEntry {
                bitmap,
                recency: self.next_recency(),
            },
        );
    }

    /// Evict least-recently-used entries until every specified limit holds.
    ///
    /// Entries are removed in ascending `(recency, id)` order, so the
    /// operation is reproducible. If no limit is exceeded nothing changes,
    /// including the surviving entries' recency values.
    pub async fn prune(&self, options: PruneOptions) {
        let max_memory = options.max_memory_bytes.unwrap_or(u64::MAX);
        let max_elements = options.max_elements.unwrap_or(u32::MAX);

        let mut entries = self.entries.write().await;

        let over_limits = |memory: u64, count: u32| memory > max_memory || count > max_elements;
        if !over_limits(
            self.memory_bytes.load(Ordering::Acquire),
            self.element_count.load(Ordering::Acquire),
        ) {
            return;
        }

        let mut by_recency: Vec<(u64, SubBlockId)> = entries
            .iter()
            .map(|(id, entry)| (entry.recency, *id))
            .collect();
        by_recency.sort_unstable();

        for (_, id) in by_recency {
            if !over_limits(
                self.memory_bytes.load(Ordering::Acquire),
                self.element_count.load(Ordering::Acquire),
            ) {
                break;
            }
            if let Some(entry) = entries.remove(&id) {
                let size = entry.bitmap.size_in_bytes();
                self.debit_memory(size);
                self.debit_element();
                tracing::debug!(?id, size, "evicted sub-block bitmap");
            }
        }
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.memory_bytes.store(0, Ordering::Release);
        self.element_count.store(0, Ordering::Release);
    }

    /// Aggregate bitmap size in bytes (lock-free single read).
    pub fn memory_usage(&self) -> u64 {
        self.memory_bytes.load(Ordering::Acquire)
    }

    /// Number of cached entries (lock-free single read).
    pub fn element_count(&self) -> u32 {
        self.element_count.load(Ordering::Acquire)
    }

    /// Both aggregate figures as one consistent snapshot.
    ///
    /// Holding the map's read lock keeps `add`/`prune`/`clear` (which update
    /// the counters under the write lock) from interleaving between the two
    /// reads.
    pub async fn statistics(&self) -> CacheStatistics {
        let _entries = self.entries.read().await;
        CacheStatistics {
            memory_usage_bytes: self.memory_bytes.load(Ordering::Acquire),
            element_count: self.element_count.load(Ordering::Acquire),
        }
    }

    fn debit_memory(&self, bytes: u64) {
        let result = self
            .memory_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(bytes)
            });
        if result.is_err() {
            panic!("cache accounting inconsistent: memory counter underflow ({bytes} bytes)");
        }
    }

    fn debit_element(&self) {
        let result = self
            .element_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
        if result.is_err() {
            panic!("cache accounting inconsistent: element counter underflow");
        }
    }
}
