//! Domain Ports (Port/Adapter Pattern)
//!
//! The sync engine depends on an abstract authoritative price store; the
//! surrounding application supplies the concrete adapter (a relational
//! database in production, [`InMemoryPriceStore`] in tests).
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 SyncEngine                   │
//! │                     │                        │
//! │              PriceStore (port)               │
//! └─────────────────────┼────────────────────────┘
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │   DatabaseAdapter │ InMemoryPriceStore │ ... │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! [`InMemoryPriceStore`]: crate::adapters::InMemoryPriceStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::{Fingerprint, PriceQuote};
use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// A price observation as held by the authoritative store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPrice {
    pub quote: PriceQuote,
    /// When the authoritative store recorded the observation.
    /// Drives pull-sync freshness comparisons.
    pub recorded_at: DateTime<Utc>,
}

impl StoredPrice {
    /// Create a record stamped with the current time
    pub fn new(quote: PriceQuote) -> Self {
        Self {
            quote,
            recorded_at: Utc::now(),
        }
    }

    /// True when this record is strictly newer than the given instant
    pub fn is_newer_than(&self, instant: DateTime<Utc>) -> bool {
        self.recorded_at > instant
    }
}

// =============================================================================
// Ports
// =============================================================================

/// Authoritative price store the pricing namespace reconciles against
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Fetch the stored observation for a pricing fingerprint, if any
    async fn fetch(&self, fingerprint: &Fingerprint) -> Result<Option<StoredPrice>>;

    /// Persist an observation so future processes can read it without
    /// re-incurring the paid call. Overwrites any previous observation for
    /// the fingerprint.
    async fn store(&self, fingerprint: &Fingerprint, quote: &PriceQuote) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote() -> PriceQuote {
        PriceQuote {
            market: 10.0,
            source: "test".to_string(),
            condition: "NM".to_string(),
            currency: "USD".to_string(),
            card_id: None,
        }
    }

    #[test]
    fn test_freshness_comparison_is_strict() {
        let record = StoredPrice::new(quote());
        assert!(!record.is_newer_than(record.recorded_at));
        assert!(record.is_newer_than(record.recorded_at - chrono::Duration::seconds(1)));
        assert!(!record.is_newer_than(record.recorded_at + chrono::Duration::seconds(1)));
    }
}
