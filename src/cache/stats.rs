//! Cache Statistics
//!
//! Monotonic per-namespace counters for operational visibility. Not
//! authoritative for correctness; a snapshot is point-in-time per namespace
//! with no ordering guarantee across namespaces.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::entry::Namespace;

/// Counters for one namespace
#[derive(Debug, Default)]
struct NamespaceCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    evictions: AtomicU64,
}

/// Per-namespace hit/miss/error/eviction counters
#[derive(Debug, Default)]
pub struct StatsCollector {
    namespaces: [NamespaceCounters; 4],
}

impl StatsCollector {
    /// Create a new collector with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, namespace: Namespace) -> &NamespaceCounters {
        &self.namespaces[namespace.index()]
    }

    /// Record a lookup served from the cache
    pub fn record_hit(&self, namespace: Namespace) {
        self.counters(namespace).hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that required computation
    pub fn record_miss(&self, namespace: Namespace) {
        self.counters(namespace)
            .misses
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that resolved with an error
    pub fn record_error(&self, namespace: Namespace) {
        self.counters(namespace)
            .errors
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record removal of an expired or corrupt entry
    pub fn record_eviction(&self, namespace: Namespace) {
        self.counters(namespace)
            .evictions
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of one namespace
    pub fn namespace_snapshot(&self, namespace: Namespace) -> NamespaceStats {
        let counters = self.counters(namespace);
        let hits = counters.hits.load(Ordering::Relaxed);
        let misses = counters.misses.load(Ordering::Relaxed);
        NamespaceStats {
            namespace,
            hits,
            misses,
            errors: counters.errors.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            hit_ratio: hit_ratio(hits, misses),
        }
    }

    /// Snapshot of all namespaces
    pub fn snapshot(&self) -> StatsSnapshot {
        let namespaces = Namespace::ALL.map(|ns| self.namespace_snapshot(ns));
        let hits = namespaces.iter().map(|s| s.hits).sum();
        let misses = namespaces.iter().map(|s| s.misses).sum();
        StatsSnapshot {
            overall_hit_ratio: hit_ratio(hits, misses),
            namespaces,
        }
    }
}

fn hit_ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Snapshot of one namespace's counters
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub namespace: Namespace,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub evictions: u64,
    pub hit_ratio: f64,
}

/// Snapshot of all counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub overall_hit_ratio: f64,
    pub namespaces: [NamespaceStats; 4],
}

impl StatsSnapshot {
    /// Counters for one namespace
    pub fn namespace(&self, namespace: Namespace) -> &NamespaceStats {
        &self.namespaces[namespace.index()]
    }
}

// =============================================================================
// Tests
// =============================================================================
