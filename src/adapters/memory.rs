//! In-Memory Price Store
//!
//! Reference [`PriceStore`] adapter. Production deployments adapt the
//! application's relational price database instead; this adapter backs
//! tests and single-process runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::cache::{Fingerprint, PriceQuote};
use crate::domain::ports::{PriceStore, StoredPrice};
use crate::error::Result;

/// In-memory authoritative price store
#[derive(Default)]
pub struct InMemoryPriceStore {
    records: RwLock<HashMap<Fingerprint, StoredPrice>>,
    fetches: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryPriceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an observation with an explicit timestamp (for freshness tests
    /// and backfills)
    pub fn insert_record(&self, fingerprint: Fingerprint, record: StoredPrice) {
        self.records.write().insert(fingerprint, record);
    }

    /// Number of observations held
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when no observations are held
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Fetch operations served so far
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Write operations accepted so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn fetch(&self, fingerprint: &Fingerprint) -> Result<Option<StoredPrice>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.read().get(fingerprint).cloned())
    }

    async fn store(&self, fingerprint: &Fingerprint, quote: &PriceQuote) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.records
            .write()
            .insert(fingerprint.clone(), StoredPrice::new(quote.clone()));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(market: f64) -> PriceQuote {
        PriceQuote {
            market,
            source: "pokemontcg.io".to_string(),
            condition: "NM".to_string(),
            currency: "USD".to_string(),
            card_id: Some("base1-4".to_string()),
        }
    }

    #[tokio::test]
    async fn test_store_then_fetch() {
        let store = InMemoryPriceStore::new();
        let fp = Fingerprint::of_bytes(b"charizard|base set|4|holo|en|");

        assert!(store.fetch(&fp).await.unwrap().is_none());

        store.store(&fp, &quote(55.0)).await.unwrap();
        let record = store.fetch(&fp).await.unwrap().unwrap();
        assert_eq!(record.quote, quote(55.0));

        assert_eq!(store.writes(), 1);
        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let store = InMemoryPriceStore::new();
        let fp = Fingerprint::of_bytes(b"key");

        store.store(&fp, &quote(10.0)).await.unwrap();
        store.store(&fp, &quote(12.0)).await.unwrap();

        assert_eq!(store.len(), 1);
        let record = store.fetch(&fp).await.unwrap().unwrap();
        assert_eq!(record.quote.market, 12.0);
    }
}
