//! Blocking Calling Convention
//!
//! A synchronous shim over the same [`CacheFacade`] (and therefore the same
//! on-disk state) as the async entry points. Keeping one store behind both
//! conventions avoids divergent duplicate results for the same fingerprint.
//!
//! Must be used from threads OUTSIDE the async runtime; calling into it
//! from a runtime worker would block that worker on itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::entry::{CacheValue, Namespace};
use super::facade::CacheFacade;
use super::fingerprint::Fingerprint;
use super::store::CacheStore;
use crate::error::Result;

/// Synchronous view of a [`CacheFacade`]
pub struct BlockingCache {
    facade: CacheFacade,
    handle: Handle,
}

impl BlockingCache {
    /// Wrap a facade, driving it on the runtime behind `handle`
    pub fn new(facade: CacheFacade, handle: Handle) -> Self {
        Self { facade, handle }
    }

    /// The shared store behind both calling conventions
    pub fn store(&self) -> &Arc<CacheStore> {
        self.facade.store()
    }

    /// Blocking cache lookup
    pub fn get(&self, namespace: Namespace, fingerprint: &Fingerprint) -> Result<Option<CacheValue>> {
        self.handle
            .block_on(self.facade.get(namespace, fingerprint))
    }

    /// Blocking `get_or_compute` with the facade's default waiter budget.
    ///
    /// The synchronous `compute` runs on the runtime's blocking pool, so it
    /// participates in the same per-key deduplication as async callers.
    pub fn get_or_compute<F>(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<CacheValue>
    where
        F: FnOnce() -> anyhow::Result<CacheValue> + Send + 'static,
    {
        self.handle.block_on(self.facade.get_or_compute(
            namespace,
            fingerprint,
            move || async move {
                tokio::task::spawn_blocking(compute)
                    .await
                    .map_err(|err| anyhow::anyhow!("computation panicked: {err}"))?
            },
        ))
    }

    /// Blocking `get_or_compute` with an explicit waiter budget
    pub fn get_or_compute_with_timeout<F>(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        wait_budget: Duration,
        compute: F,
    ) -> Result<CacheValue>
    where
        F: FnOnce() -> anyhow::Result<CacheValue> + Send + 'static,
    {
        self.handle
            .block_on(self.facade.get_or_compute_with_timeout(
                namespace,
                fingerprint,
                wait_budget,
                move || async move {
                    tokio::task::spawn_blocking(compute)
                        .await
                        .map_err(|err| anyhow::anyhow!("computation panicked: {err}"))?
                },
            ))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::{EntrySource, PriceQuote};
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

    #[test]
    fn test_blocking_get_or_compute_roundtrip() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = runtime
            .block_on(CacheStore::open(CacheConfig::rooted_at(dir.path())))
            .unwrap();
        let blocking = BlockingCache::new(
            CacheFacade::new(Arc::new(store)),
            runtime.handle().clone(),
        );

        let fp = Fingerprint::of_bytes(b"charizard");
        let value = blocking
            .get_or_compute(Namespace::Pricing, &fp, || Ok(quote(31.0)))
            .unwrap();
        assert_eq!(value, quote(31.0));

        // Second call is a hit; the computation must not run again.
        let value = blocking
            .get_or_compute(Namespace::Pricing, &fp, || {
                panic!("must not recompute a cached key")
            })
            .unwrap();
        assert_eq!(value, quote(31.0));
    }

    #[test]
    fn test_blocking_and_async_share_state() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            runtime
                .block_on(CacheStore::open(CacheConfig::rooted_at(dir.path())))
                .unwrap(),
        );
        let facade = CacheFacade::new(Arc::clone(&store));
        let blocking = BlockingCache::new(facade.clone(), runtime.handle().clone());

        let fp = Fingerprint::of_bytes(b"shared key");
        runtime
            .block_on(store.set(Namespace::Pricing, &fp, quote(9.0), EntrySource::Api))
            .unwrap();

        // Written through the async path, visible through the blocking one.
        let value = blocking.get(Namespace::Pricing, &fp).unwrap();
        assert_eq!(value, Some(quote(9.0)));
    }
}
