//! Result Cache
//!
//! Durable, namespace-partitioned cache for identification and pricing
//! results, keyed by content fingerprints.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CacheFacade                             │
//! │   get_or_compute — at most one computation in flight per key │
//! │   (BlockingCache: same facade, synchronous convention)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │                      CacheStore                              │
//! │   identification │ card_data │ ebay_url │ pricing            │
//! │   one JSON file per entry, write-then-rename, lazy TTL       │
//! └──────────────────────────────────────────────────────────────┘
//!           │                                     │
//!   FingerprintGenerator                    StatsCollector
//!   (sha-256 content keys)            (hits/misses/errors/evictions)
//! ```
//!
//! The sync engine (crate::sync) reconciles the pricing namespace against
//! the authoritative price store through the same get/set entry points.

mod blocking;
mod entry;
mod facade;
mod fingerprint;
mod stats;
mod store;

mod proptest;

pub use blocking::BlockingCache;
pub use entry::{
    CacheEntry, CacheKey, CacheValue, CardRecord, EntrySource, IdentificationResult, Namespace,
    PriceQuote,
};
pub use facade::CacheFacade;
pub use fingerprint::{fingerprint_files, Fingerprint, PricingKey};
pub use stats::{NamespaceStats, StatsCollector, StatsSnapshot};
pub use store::{CacheStore, NamespaceReport, NamespaceScan};
