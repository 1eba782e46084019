//! tcgcache - Result Cache for Card Identification & Pricing Pipelines
//!
//! A durable cache that sits between an expensive, rate-limited
//! identification/pricing pipeline and its callers. Results are keyed by
//! deterministic content fingerprints, partitioned into four namespaces,
//! and reconciled against an authoritative price store out-of-band.
//!
//! # Architecture
//!
//! ```text
//! workers ──▶ CacheFacade ──▶ CacheStore ◀── SyncEngine ◀──▶ PriceStore
//!   (get_or_compute,            (durable,        (pull/push     (port)
//!    per-key dedup)              per-namespace)   batches)
//! ```
//!
//! # Guarantees
//!
//! - One computation in flight per key under concurrent callers
//! - Stale entries are never returned as fresh
//! - Corrupt entries self-heal into misses, never into bad values
//! - Computation failures propagate to every waiter and are never cached
//!
//! # Modules
//!
//! - [`cache`] - fingerprints, entries, the durable store, the dedup facade
//! - [`sync`] - price-store reconciliation engine
//! - [`domain`] - ports the core depends on
//! - [`adapters`] - reference port implementations
//! - [`config`] - construction-time configuration
//! - [`error`] - error types

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod sync;

// Re-export commonly used types
pub use cache::{
    BlockingCache, CacheEntry, CacheFacade, CacheKey, CacheStore, CacheValue, EntrySource,
    Fingerprint, Namespace, PricingKey, StatsSnapshot,
};
pub use config::CacheConfig;
pub use domain::{PriceStore, StoredPrice};
pub use error::{Error, Result};
pub use sync::{SyncEngine, SyncReport};
