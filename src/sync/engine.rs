//! Sync Engine - Pricing Namespace Reconciliation
//!
//! Keeps the pricing namespace aligned with the authoritative price store,
//! out-of-band from the request path:
//!
//! - **Pull**: entries approaching or past TTL are refreshed from the
//!   authoritative store when it holds strictly fresher data.
//! - **Push**: entries fetched from a paid external call
//!   (`source = "api"`) and not yet mirrored are submitted to the
//!   authoritative store, then re-tagged as mirrored.
//!
//! # Guarantees
//!
//! 1. Failures are isolated per record; one bad record never aborts a batch
//! 2. Failed records are retried on the next pass, not tracked in memory
//! 3. Re-running a pass with no intervening external changes writes nothing
//! 4. Only the public `get`/`set`/`scan` store entry points are used, so a
//!    pass can run concurrently with request-path traffic

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEntry, CacheStore, CacheValue, EntrySource, Fingerprint, Namespace, PriceQuote,
};
use crate::domain::ports::PriceStore;
use crate::error::{Error, Result};

/// Concurrent reconciliations within one batch
const BATCH_CONCURRENCY: usize = 8;

/// Outcome of one sync pass (or one direction of it)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Pricing entries examined
    pub scanned: u64,
    /// Entries overwritten from the authoritative store
    pub pulled: u64,
    /// Entries mirrored out to the authoritative store
    pub pushed: u64,
    /// Records that failed and will be retried next pass
    pub failed: u64,
}

impl SyncReport {
    fn merge(&mut self, other: SyncReport) {
        self.scanned += other.scanned;
        self.pulled += other.pulled;
        self.pushed += other.pushed;
        self.failed += other.failed;
    }

    /// True when the pass changed nothing anywhere
    pub fn is_noop(&self) -> bool {
        self.pulled == 0 && self.pushed == 0
    }
}

/// Reconciles the pricing namespace against a [`PriceStore`]
pub struct SyncEngine {
    store: Arc<CacheStore>,
    price_store: Arc<dyn PriceStore>,
}

impl SyncEngine {
    /// Create an engine over a cache store and an authoritative price store
    pub fn new(store: Arc<CacheStore>, price_store: Arc<dyn PriceStore>) -> Self {
        Self { store, price_store }
    }

    /// One full reconciliation pass: pull refreshes for entries inside the
    /// configured refresh window, then push unmirrored API observations.
    pub async fn run_pass(&self) -> Result<SyncReport> {
        let candidates = self.refresh_candidates().await?;
        let mut report = self.pull(&candidates).await?;
        report.scanned = 0; // scanned is counted once, by push's full scan
        report.merge(self.push().await?);

        info!(
            scanned = report.scanned,
            pulled = report.pulled,
            pushed = report.pushed,
            failed = report.failed,
            "sync pass complete"
        );
        Ok(report)
    }

    /// Pricing fingerprints whose remaining TTL fraction is inside the
    /// refresh window (including entries already past TTL)
    pub async fn refresh_candidates(&self) -> Result<Vec<Fingerprint>> {
        let window = self.store.config().sync_refresh_window;
        let now = Utc::now();
        let mut scan = self.store.scan_namespace(Namespace::Pricing).await?;
        let mut candidates = Vec::new();
        while let Some(entry) = scan.next().await? {
            if entry.remaining_ttl_fraction(now) <= window {
                candidates.push(entry.fingerprint);
            }
        }
        debug!(count = candidates.len(), "pull-refresh candidates selected");
        Ok(candidates)
    }

    // =========================================================================
    // Pull
    // =========================================================================

    /// Refresh the given fingerprints from the authoritative store, in
    /// bounded batches. A record failure is counted and retried next pass.
    pub async fn pull(&self, fingerprints: &[Fingerprint]) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for batch in fingerprints.chunks(self.store.config().sync_batch_size) {
            let outcomes: Vec<_> = stream::iter(batch)
                .map(|fingerprint| async move {
                    (fingerprint, self.pull_one(fingerprint).await)
                })
                .buffer_unordered(BATCH_CONCURRENCY)
                .collect()
                .await;

            for (fingerprint, outcome) in outcomes {
                report.scanned += 1;
                match outcome {
                    Ok(true) => report.pulled += 1,
                    Ok(false) => {}
                    Err(err) => {
                        report.failed += 1;
                        warn!(
                            sync_error = %Error::Sync {
                                fingerprint: fingerprint.to_string(),
                                reason: err.to_string(),
                            },
                            "pull failed, will retry next pass"
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    /// Pull one fingerprint. `Ok(true)` when the cache entry was overwritten.
    async fn pull_one(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let Some(record) = self.price_store.fetch(fingerprint).await? else {
            return Ok(false);
        };

        if let Some(entry) = self.store.get(Namespace::Pricing, fingerprint).await? {
            if !record.is_newer_than(entry.created_at) {
                return Ok(false);
            }
            // Fresher timestamp but identical data: rewriting would only
            // churn created_at and defeat pass idempotence.
            if pricing_value(&entry) == Some(&record.quote) {
                return Ok(false);
            }
        }

        self.store
            .set(
                Namespace::Pricing,
                fingerprint,
                CacheValue::Pricing(record.quote),
                EntrySource::DatabaseSync,
            )
            .await?;
        debug!(%fingerprint, "entry refreshed from price store");
        Ok(true)
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Mirror every unmirrored API-sourced pricing entry out to the
    /// authoritative store. Mirrored entries are re-tagged `database-sync`
    /// (same `created_at`) so the next pass skips them.
    pub async fn push(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let mut scan = self.store.scan_namespace(Namespace::Pricing).await?;
        let mut unmirrored = Vec::new();
        while let Some(entry) = scan.next().await? {
            report.scanned += 1;
            if entry.source == EntrySource::Api {
                unmirrored.push(entry);
            }
        }

        for batch in unmirrored.chunks(self.store.config().sync_batch_size) {
            let outcomes: Vec<_> = stream::iter(batch)
                .map(|entry| async move { (entry, self.push_one(entry).await) })
                .buffer_unordered(BATCH_CONCURRENCY)
                .collect()
                .await;

            for (entry, outcome) in outcomes {
                match outcome {
                    Ok(()) => report.pushed += 1,
                    Err(err) => {
                        report.failed += 1;
                        warn!(
                            sync_error = %Error::Sync {
                                fingerprint: entry.fingerprint.to_string(),
                                reason: err.to_string(),
                            },
                            "push failed, will retry next pass"
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    /// Mirror one entry, then mark it mirrored
    async fn push_one(&self, entry: &CacheEntry) -> Result<()> {
        let Some(quote) = pricing_value(entry) else {
            // Cannot happen for validated pricing entries; treated as a
            // record-level failure rather than a panic.
            return Err(Error::Sync {
                fingerprint: entry.fingerprint.to_string(),
                reason: "entry holds a non-pricing payload".to_string(),
            });
        };

        self.price_store.store(&entry.fingerprint, quote).await?;

        let mut mirrored = entry.clone();
        mirrored.source = EntrySource::DatabaseSync;
        self.store.put_entry(&mirrored).await?;
        debug!(fingerprint = %entry.fingerprint, "entry mirrored to price store");
        Ok(())
    }
}

fn pricing_value(entry: &CacheEntry) -> Option<&PriceQuote> {
    match &entry.value {
        CacheValue::Pricing(quote) => Some(quote),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
