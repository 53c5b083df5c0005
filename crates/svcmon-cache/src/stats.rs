//! Registry statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for one entity registry.
///
/// All counters are atomic and can be safely accessed from multiple threads.
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Entities constructed on first sight of a uuid.
    created: AtomicU64,
    /// Refreshes of an already registered entity.
    refreshed: AtomicU64,
    /// Entities torn down and erased.
    removed: AtomicU64,
    /// Lookups that found the uuid.
    hits: AtomicU64,
    /// Lookups that did not.
    misses: AtomicU64,
    /// Back-links written into this registry's entities by peers.
    back_links_added: AtomicU64,
    /// Back-links cleared from this registry's entities by peers.
    back_links_removed: AtomicU64,
    /// Back-links skipped because the target uuid was not registered.
    back_links_deferred: AtomicU64,
}

impl RegistryStats {
    /// Create new registry statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly constructed entity.
    #[inline]
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a refresh of an existing entity.
    #[inline]
    pub fn record_refreshed(&self) {
        self.refreshed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tear-down.
    #[inline]
    pub fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup hit.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup miss.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a back-link written by a peer.
    #[inline]
    pub fn record_back_link_added(&self) {
        self.back_links_added.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a back-link cleared by a peer.
    #[inline]
    pub fn record_back_link_removed(&self) {
        self.back_links_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a back-link deferred because its target is unknown.
    #[inline]
    pub fn record_back_link_deferred(&self) {
        self.back_links_deferred.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total entities created.
    #[inline]
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Get total refreshes of existing entities.
    #[inline]
    pub fn refreshed(&self) -> u64 {
        self.refreshed.load(Ordering::Relaxed)
    }

    /// Get total entities removed.
    #[inline]
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }

    /// Get total lookup hits.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total lookup misses.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total back-links added by peers.
    #[inline]
    pub fn back_links_added(&self) -> u64 {
        self.back_links_added.load(Ordering::Relaxed)
    }

    /// Get total back-links removed by peers.
    #[inline]
    pub fn back_links_removed(&self) -> u64 {
        self.back_links_removed.load(Ordering::Relaxed)
    }

    /// Get total back-links deferred.
    #[inline]
    pub fn back_links_deferred(&self) -> u64 {
        self.back_links_deferred.load(Ordering::Relaxed)
    }

    /// Calculate lookup hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.created,
            &self.refreshed,
            &self.removed,
            &self.hits,
            &self.misses,
            &self.back_links_added,
            &self.back_links_removed,
            &self.back_links_deferred,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
