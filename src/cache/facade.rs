//! Concurrency Facade - Request Collapsing
//!
//! `get_or_compute` gives callers a simple contract while guaranteeing at
//! most one in-flight computation per (namespace, fingerprint) key: under N
//! concurrent callers for the same uncached key, exactly one computation
//! runs and every caller receives its result.
//!
//! The winning caller spawns the computation as a detached task. Dropping a
//! waiter (caller cancellation, timeout) therefore never aborts a
//! computation already shared with other waiters; it completes and
//! populates the cache regardless.
//!
//! Failures are broadcast to every current waiter and are never cached, so
//! a later call is free to retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::entry::{CacheKey, CacheValue, EntrySource, Namespace};
use super::fingerprint::Fingerprint;
use super::stats::StatsCollector;
use super::store::CacheStore;
use crate::error::{Error, Result};

/// Shared outcome of one in-flight computation
#[derive(Debug, Clone)]
enum FlightState {
    Pending,
    Done(CacheValue),
    Failed(String),
}

/// Deduplicating entry point over a [`CacheStore`]
#[derive(Clone)]
pub struct CacheFacade {
    store: Arc<CacheStore>,
    inflight: Arc<DashMap<CacheKey, watch::Receiver<FlightState>>>,
    stats: Arc<StatsCollector>,
    default_wait: Duration,
}

impl CacheFacade {
    /// Create a facade over a store. The waiter budget defaults to the
    /// store's configured `dedup_wait_timeout`.
    pub fn new(store: Arc<CacheStore>) -> Self {
        let stats = store.stats();
        let default_wait = store.config().dedup_wait_timeout;
        Self {
            store,
            inflight: Arc::new(DashMap::new()),
            stats,
            default_wait,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Cache lookup without computation; records a hit or miss
    pub async fn get(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheValue>> {
        let found = self.store.get(namespace, fingerprint).await?;
        match found {
            Some(entry) => {
                self.stats.record_hit(namespace);
                Ok(Some(entry.value))
            }
            None => {
                self.stats.record_miss(namespace);
                Ok(None)
            }
        }
    }

    /// Get the cached value for the key, or compute and cache it, with the
    /// facade's default waiter budget.
    pub async fn get_or_compute<F, Fut>(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<CacheValue>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<CacheValue>> + Send + 'static,
    {
        self.get_or_compute_with_timeout(namespace, fingerprint, self.default_wait, compute)
            .await
    }

    /// Get the cached value for the key, or compute and cache it.
    ///
    /// On a hit the computation is never invoked. On a miss, one caller's
    /// computation serves all concurrent callers of the key; the others wait
    /// up to `wait_budget` and then fail with [`Error::Timeout`] while the
    /// computation carries on. A failed computation is reported to every
    /// waiter as [`Error::Compute`] and leaves the key uncached.
    pub async fn get_or_compute_with_timeout<F, Fut>(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        wait_budget: Duration,
        compute: F,
    ) -> Result<CacheValue>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<CacheValue>> + Send + 'static,
    {
        let key = CacheKey::new(namespace, fingerprint.clone());

        if let Some(entry) = self.store.get(namespace, fingerprint).await? {
            self.stats.record_hit(namespace);
            return Ok(entry.value);
        }

        // Join the in-flight computation for this key, or become its owner.
        // The shard guard must not be held across an await point, so the
        // spawn happens after the match.
        let mut owner = None;
        let mut rx = match self.inflight.entry(key.clone()) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(FlightState::Pending);
                vacant.insert(rx.clone());
                owner = Some(tx);
                rx
            }
        };

        if let Some(tx) = owner {
            self.spawn_flight(key.clone(), tx, compute);
        }

        let outcome = tokio::time::timeout(wait_budget, async {
            loop {
                let state = rx.borrow_and_update().clone();
                match state {
                    FlightState::Pending => {
                        if rx.changed().await.is_err() {
                            // Publisher vanished without a result.
                            return FlightState::Failed("computation abandoned".to_string());
                        }
                    }
                    resolved => return resolved,
                }
            }
        })
        .await;

        match outcome {
            Ok(FlightState::Done(value)) => {
                self.stats.record_miss(namespace);
                Ok(value)
            }
            Ok(FlightState::Failed(message)) => {
                self.stats.record_error(namespace);
                Err(Error::Compute {
                    key: key.to_string(),
                    message,
                })
            }
            Ok(FlightState::Pending) => unreachable!("flight resolved while pending"),
            Err(_elapsed) => {
                self.stats.record_error(namespace);
                Err(Error::Timeout {
                    key: key.to_string(),
                    waited: wait_budget,
                })
            }
        }
    }

    /// Run the computation as a detached task: publish the outcome, then
    /// unregister the flight.
    fn spawn_flight<F, Fut>(&self, key: CacheKey, tx: watch::Sender<FlightState>, compute: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<CacheValue>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let inflight = Arc::clone(&self.inflight);

        tokio::spawn(async move {
            let state = Self::run_flight(&store, &key, compute).await;
            // Publish before unregistering: a caller that misses the registry
            // after removal re-reads the store, which already has the value.
            let _ = tx.send(state);
            inflight.remove(&key);
        });
    }

    async fn run_flight<F, Fut>(store: &CacheStore, key: &CacheKey, compute: F) -> FlightState
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<CacheValue>>,
    {
        let namespace = key.namespace();

        // The owner may have lost a race with a completed flight between its
        // store miss and registering; re-check before paying for compute.
        match store.get(namespace, key.fingerprint()).await {
            Ok(Some(entry)) => return FlightState::Done(entry.value),
            Ok(None) => {}
            Err(err) => warn!(%key, error = %err, "pre-compute cache re-check failed"),
        }

        match compute().await {
            Ok(value) => {
                if value.namespace() != namespace {
                    return FlightState::Failed(format!(
                        "computation produced a {} value for the {} namespace",
                        value.kind(),
                        namespace
                    ));
                }
                if let Err(err) = store
                    .set(namespace, key.fingerprint(), value.clone(), EntrySource::Api)
                    .await
                {
                    // The computed result is still delivered to waiters; the
                    // next call simply recomputes.
                    warn!(%key, error = %err, "failed to cache computed value");
                } else {
                    debug!(%key, "computed value cached");
                }
                FlightState::Done(value)
            }
            Err(err) => {
                warn!(%key, error = format!("{err:#}"), "computation failed");
                FlightState::Failed(format!("{err:#}"))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;

    use super::*;
    use crate::cache::entry::PriceQuote;
    use crate::config::CacheConfig;

    fn quote(market: f64) -> CacheValue {
        CacheValue::Pricing(PriceQuote {
            market,
            source: "pokemontcg.io".to_string(),
            condition: "NM".to_string(),
            currency: "USD".to_string(),
            card_id: None,
        })
    }

    async fn facade(dir: &tempfile::TempDir) -> CacheFacade {
        let store = CacheStore::open(CacheConfig::rooted_at(dir.path()))
            .await
            .unwrap();
        CacheFacade::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_hit_skips_computation() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(&dir).await;
        let fp = Fingerprint::of_bytes(b"charizard");

        facade
            .store()
            .set(Namespace::Pricing, &fp, quote(50.0), EntrySource::Api)
            .await
            .unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = facade
            .get_or_compute(Namespace::Pricing, &fp, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(quote(999.0))
            })
            .await
            .unwrap();

        assert_eq!(value, quote(50.0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            facade.stats.namespace_snapshot(Namespace::Pricing).hits,
            1
        );
    }

    #[tokio::test]
    async fn test_miss_computes_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(&dir).await;
        let fp = Fingerprint::of_bytes(b"charizard");

        let value = facade
            .get_or_compute(Namespace::Pricing, &fp, move || async move {
                Ok(quote(75.0))
            })
            .await
            .unwrap();
        assert_eq!(value, quote(75.0));

        let cached = facade.store().get(Namespace::Pricing, &fp).await.unwrap();
        assert_eq!(cached.unwrap().value, quote(75.0));
        assert_eq!(
            facade.stats.namespace_snapshot(Namespace::Pricing).misses,
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_computation() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(&dir).await;
        let fp = Fingerprint::of_bytes(b"duplicate submission");
        let calls = Arc::new(AtomicU32::new(0));

        let mut join_set = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let facade = facade.clone();
            let fp = fp.clone();
            let calls = calls.clone();
            join_set.spawn(async move {
                facade
                    .get_or_compute(Namespace::Pricing, &fp, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(quote(42.0))
                    })
                    .await
            });
        }

        let mut results = Vec::new();
        while let Some(result) = join_set.join_next().await {
            results.push(result.unwrap().unwrap());
        }

        assert_eq!(results.len(), 16);
        assert!(results.iter().all(|v| *v == quote(42.0)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_waiters_and_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(&dir).await;
        let fp = Fingerprint::of_bytes(b"flaky card");

        let err = facade
            .get_or_compute(Namespace::Pricing, &fp, move || async move {
                Err(anyhow::anyhow!("identification API returned 500"))
            })
            .await
            .unwrap_err();
        assert_matches!(err, Error::Compute { message, .. } => {
            assert!(message.contains("identification API returned 500"));
        });

        // The failure was not cached; a retry succeeds.
        let value = facade
            .get_or_compute(Namespace::Pricing, &fp, move || async move {
                Ok(quote(12.0))
            })
            .await
            .unwrap();
        assert_eq!(value, quote(12.0));

        let stats = facade.stats.namespace_snapshot(Namespace::Pricing);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiter_timeout_leaves_flight_running() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(&dir).await;
        let fp = Fingerprint::of_bytes(b"slow card");

        let err = facade
            .get_or_compute_with_timeout(
                Namespace::Pricing,
                &fp,
                Duration::from_millis(50),
                move || async move {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    Ok(quote(7.0))
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::Timeout { .. });

        // The detached computation still completes and populates the cache.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let cached = facade.store().get(Namespace::Pricing, &fp).await.unwrap();
        assert_eq!(cached.unwrap().value, quote(7.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_abandoned_caller_does_not_abort_shared_flight() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(&dir).await;
        let fp = Fingerprint::of_bytes(b"cancelled batch");

        let first = {
            let facade = facade.clone();
            let fp = fp.clone();
            tokio::spawn(async move {
                facade
                    .get_or_compute(Namespace::Pricing, &fp, move || async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(quote(3.0))
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        first.abort();

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = facade
            .get_or_compute(Namespace::Pricing, &fp, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(quote(999.0))
            })
            .await
            .unwrap();

        // The aborted caller's flight completed and served this caller.
        assert_eq!(value, quote(3.0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_namespace_result_is_a_compute_failure() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade(&dir).await;
        let fp = Fingerprint::of_bytes(b"confused compute");

        let err = facade
            .get_or_compute(Namespace::EbayUrl, &fp, move || async move {
                Ok(quote(5.0))
            })
            .await
            .unwrap_err();
        assert_matches!(err, Error::Compute { .. });
        assert!(facade
            .store()
            .get(Namespace::EbayUrl, &fp)
            .await
            .unwrap()
            .is_none());
    }
}
