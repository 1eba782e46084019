//! Cache configuration
//!
//! All tunables are supplied at construction time. The cache never reads
//! process-wide state; callers hold an explicit [`CacheConfig`] and pass it
//! to [`CacheStore::open`](crate::cache::CacheStore::open).

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::Namespace;
use crate::error::{Error, Result};

/// Configuration for the cache subsystem
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding one subdirectory per namespace
    pub root: PathBuf,

    /// TTL for identification results.
    ///
    /// Identification of a physical card does not change, so this is long.
    pub identification_ttl: Duration,

    /// TTL for database-validated card records
    pub card_data_ttl: Duration,

    /// TTL for externally-hosted image URLs
    pub ebay_url_ttl: Duration,

    /// TTL for price quotes. Market prices move, so this is short.
    pub pricing_ttl: Duration,

    /// Maximum records reconciled against the price store per batch
    pub sync_batch_size: usize,

    /// Fraction of TTL remaining below which a pricing entry is
    /// pull-refreshed by a sync pass (0.0..=1.0)
    pub sync_refresh_window: f64,

    /// Default budget a waiter spends on a shared in-flight computation
    /// before failing with `Timeout`
    pub dedup_wait_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".tcgcache"),
            identification_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            card_data_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            ebay_url_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            pricing_ttl: Duration::from_secs(24 * 60 * 60),
            sync_batch_size: 50,
            sync_refresh_window: 0.25,
            dedup_wait_timeout: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a configuration rooted at the given directory, with defaults
    /// for everything else.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// TTL applied to entries written into the given namespace
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Identification => self.identification_ttl,
            Namespace::CardData => self.card_data_ttl,
            Namespace::EbayUrl => self.ebay_url_ttl,
            Namespace::Pricing => self.pricing_ttl,
        }
    }

    /// Validate tunables that have constrained ranges
    pub fn validate(&self) -> Result<()> {
        if self.sync_batch_size == 0 {
            return Err(Error::Config(
                "sync_batch_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sync_refresh_window) {
            return Err(Error::Config(format!(
                "sync_refresh_window must be within 0.0..=1.0, got {}",
                self.sync_refresh_window
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pricing_ttl_shorter_than_identification() {
        let config = CacheConfig::default();
        assert!(config.ttl_for(Namespace::Pricing) < config.ttl_for(Namespace::Identification));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = CacheConfig {
            sync_batch_size: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_refresh_window_range_rejected() {
        let config = CacheConfig {
            sync_refresh_window: 1.5,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
