//! Cache Entry Types
//!
//! The data model for stored results: namespaces, typed payloads, and the
//! persisted entry record. Payloads are structured data rather than raw
//! bytes so that a corrupt or mismatched record fails deserialization
//! instead of flowing downstream.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use crate::error::{Error, Result};

// =============================================================================
// Namespaces
// =============================================================================

/// A partition of the cache holding one semantic category of result.
///
/// Fingerprint uniqueness is required within a namespace only; the same
/// fingerprint may appear in two namespaces for unrelated reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Card identification results from the recognition API
    Identification,
    /// Database-validated card records
    CardData,
    /// Externally-hosted image URLs
    EbayUrl,
    /// Price quotes
    Pricing,
}

impl Namespace {
    /// All namespaces, in stable order
    pub const ALL: [Namespace; 4] = [
        Namespace::Identification,
        Namespace::CardData,
        Namespace::EbayUrl,
        Namespace::Pricing,
    ];

    /// Directory name used for on-disk partitioning
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Identification => "identification",
            Namespace::CardData => "card_data",
            Namespace::EbayUrl => "ebay_url",
            Namespace::Pricing => "pricing",
        }
    }

    /// Stable index into per-namespace counter arrays
    pub(crate) fn index(&self) -> usize {
        match self {
            Namespace::Identification => 0,
            Namespace::CardData => 1,
            Namespace::EbayUrl => 2,
            Namespace::Pricing => 3,
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl std::str::FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "identification" => Ok(Namespace::Identification),
            "card_data" => Ok(Namespace::CardData),
            "ebay_url" => Ok(Namespace::EbayUrl),
            "pricing" => Ok(Namespace::Pricing),
            other => Err(Error::Config(format!("unknown namespace: {other}"))),
        }
    }
}

// =============================================================================
// Cache Key
// =============================================================================

/// Composite key addressing one entry: (namespace, fingerprint)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    fingerprint: Fingerprint,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(namespace: Namespace, fingerprint: Fingerprint) -> Self {
        Self {
            namespace,
            fingerprint,
        }
    }

    /// Namespace component
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Fingerprint component
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.fingerprint)
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Provenance of a cached entry, used by sync to decide whether an entry
/// still needs outbound reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntrySource {
    /// Freshly fetched from a paid external call
    Api,
    /// Pulled from, or already mirrored to, the authoritative price store
    DatabaseSync,
    /// Entered by an operator
    Manual,
}

/// Card identification result as returned by the recognition API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub name: String,
    pub set_name: String,
    pub number: String,
    pub rarity: String,
    pub finish: String,
    pub language: String,
    /// Recognition confidence in 0.0..=1.0
    pub confidence: f64,
    #[serde(default)]
    pub unique_characteristics: Vec<String>,
}

/// Card record validated against the authoritative card database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    /// Authoritative database id
    pub card_id: String,
    pub name: String,
    pub set_name: String,
    pub number: String,
    pub rarity: String,
    pub database_validated: bool,
}

/// A single price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Market price in `currency`
    pub market: f64,
    /// Where the quote came from (API name, scraper, ...)
    pub source: String,
    /// Card condition the quote applies to
    pub condition: String,
    pub currency: String,
    /// Authoritative card id, when the card has been database-validated.
    /// Required for outbound sync; quotes without it stay cache-local.
    #[serde(default)]
    pub card_id: Option<String>,
}

/// The cached payload: a tagged union of the four namespace value shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CacheValue {
    Identification(IdentificationResult),
    CardData(CardRecord),
    EbayUrl(String),
    Pricing(PriceQuote),
}

impl CacheValue {
    /// The namespace this value belongs to
    pub fn namespace(&self) -> Namespace {
        match self {
            CacheValue::Identification(_) => Namespace::Identification,
            CacheValue::CardData(_) => Namespace::CardData,
            CacheValue::EbayUrl(_) => Namespace::EbayUrl,
            CacheValue::Pricing(_) => Namespace::Pricing,
        }
    }

    /// Short label used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            CacheValue::Identification(_) => "identification",
            CacheValue::CardData(_) => "card_data",
            CacheValue::EbayUrl(_) => "ebay_url",
            CacheValue::Pricing(_) => "pricing",
        }
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// One persisted cache record.
///
/// Immutable once written; updates are overwrite-by-key. Staleness is
/// strictly `now > created_at + ttl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub namespace: Namespace,
    pub fingerprint: Fingerprint,
    pub value: CacheValue,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub source: EntrySource,
}

impl CacheEntry {
    /// Build a fresh entry stamped with the current time
    pub fn new(
        namespace: Namespace,
        fingerprint: Fingerprint,
        value: CacheValue,
        ttl: Duration,
        source: EntrySource,
    ) -> Result<Self> {
        if value.namespace() != namespace {
            return Err(Error::NamespaceMismatch {
                namespace: namespace.to_string(),
                value_kind: value.kind().to_string(),
            });
        }
        Ok(Self {
            namespace,
            fingerprint,
            value,
            created_at: Utc::now(),
            ttl_seconds: ttl.as_secs(),
            source,
        })
    }

    /// When the entry turns stale
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(self.ttl_seconds as i64)
    }

    /// Staleness at an explicit instant (strict: the boundary itself is fresh)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Staleness now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// TTL remaining at an explicit instant, as a fraction of the full TTL.
    /// Zero once expired; 1.0 at creation. Entries with a zero TTL report 0.
    pub fn remaining_ttl_fraction(&self, now: DateTime<Utc>) -> f64 {
        if self.ttl_seconds == 0 {
            return 0.0;
        }
        let remaining = (self.expires_at() - now).num_seconds();
        (remaining.max(0) as f64 / self.ttl_seconds as f64).min(1.0)
    }

    /// Structural consistency check applied on read.
    ///
    /// The namespace tag, the payload variant, and the fingerprint the file
    /// was addressed by must all agree.
    pub fn validate(&self, namespace: Namespace, fingerprint: &Fingerprint) -> Result<()> {
        let reason = if self.namespace != namespace {
            Some(format!(
                "entry tagged {} found in {} namespace",
                self.namespace, namespace
            ))
        } else if self.value.namespace() != self.namespace {
            Some(format!(
                "{} payload in {} entry",
                self.value.kind(),
                self.namespace
            ))
        } else if &self.fingerprint != fingerprint {
            Some("fingerprint does not match storage address".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::CorruptEntry {
                namespace: namespace.to_string(),
                fingerprint: fingerprint.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Key addressing this entry
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.namespace, self.fingerprint.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
