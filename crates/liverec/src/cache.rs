// Segment dedup cache: bounded, recency-ordered set of already captured segment URLs.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use rustc_hash::FxBuildHasher;

/// Fixed-capacity LRU set keyed by resolved segment URL.
///
/// Backed by a moka cache with the LRU policy, so admission never rejects a new
/// entry. Moka applies recency updates and evictions lazily; every mutation here
/// runs the pending maintenance straight away so at most `capacity` URLs are ever
/// present and the evicted one is always the least recently used.
pub struct SegmentCache {
    entries: Cache<String, (), FxBuildHasher>,
}

impl SegmentCache {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Segment cache capacity must be greater than zero");
        let entries = Cache::builder()
            .max_capacity(capacity as u64)
            .eviction_policy(EvictionPolicy::lru())
            .build_with_hasher(FxBuildHasher);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Presence probe that leaves recency untouched.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Returns whether `url` is present, marking it most recently used on a hit.
    pub fn touch(&self, url: &str) -> bool {
        let hit = self.entries.get(url).is_some();
        if hit {
            self.entries.run_pending_tasks();
        }
        hit
    }

    /// Records `url`, evicting the least recently used entry when full.
    pub fn insert(&self, url: impl Into<String>) {
        self.entries.insert(url.into(), ());
        self.entries.run_pending_tasks();
    }
}
