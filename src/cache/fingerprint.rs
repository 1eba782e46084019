//! Content Fingerprints
//!
//! Deterministic, content-derived cache keys. Binary inputs hash the full
//! input bytes, so identical images under different names or paths collapse
//! to one key and a single-byte change produces a different key. Structured
//! pricing lookups are canonicalized (case, whitespace, characteristic
//! order) before hashing so logically equal requests always fingerprint
//! identically.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// How many files a batch fingerprint run reads concurrently
const BATCH_HASH_CONCURRENCY: usize = 8;

// =============================================================================
// Fingerprint
// =============================================================================

/// A deterministic content-derived identifier: lowercase hex SHA-256
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a byte slice
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprint a file's full contents (blocking).
    ///
    /// A read failure is [`Error::InputUnreadable`], never an empty result:
    /// an unreadable input must not masquerade as a cache miss.
    pub fn of_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::InputUnreadable {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Fingerprint a file's full contents without blocking the runtime
    pub async fn of_file_async(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| Error::InputUnreadable {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Reconstruct a fingerprint from its stored hex form.
    ///
    /// Used when decoding storage filenames; rejects anything that is not
    /// 64 lowercase hex characters.
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let valid = hex_str.len() == 64
            && hex_str
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex_str.to_string()))
    }

    /// Hex form, as used for storage filenames
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint many files concurrently.
///
/// Reads are bounded to avoid exhausting file descriptors on large batches.
/// Failures are per-file: one unreadable image does not fail the batch.
pub async fn fingerprint_files(
    paths: impl IntoIterator<Item = PathBuf>,
) -> Vec<(PathBuf, Result<Fingerprint>)> {
    stream::iter(paths)
        .map(|path| async move {
            let result = Fingerprint::of_file_async(&path).await;
            (path, result)
        })
        .buffer_unordered(BATCH_HASH_CONCURRENCY)
        .collect()
        .await
}

// =============================================================================
// Pricing Keys
// =============================================================================

/// The discriminating fields of a pricing lookup.
///
/// Two lookups that differ only in letter case, surrounding/repeated
/// whitespace, or the order of `characteristics` fingerprint identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingKey {
    pub card_name: String,
    pub set_name: String,
    pub number: String,
    pub finish: String,
    pub language: String,
    pub characteristics: Vec<String>,
}

impl PricingKey {
    /// Canonical form: every field case-folded and whitespace-collapsed,
    /// characteristics deduplicated and sorted
    fn canonical(&self) -> String {
        let mut characteristics: Vec<String> = self
            .characteristics
            .iter()
            .map(|c| normalize_field(c))
            .filter(|c| !c.is_empty())
            .collect();
        characteristics.sort();
        characteristics.dedup();

        // Field order is fixed here, so construction order can never leak
        // into the fingerprint.
        [
            normalize_field(&self.card_name),
            normalize_field(&self.set_name),
            normalize_field(&self.number),
            normalize_field(&self.finish),
            normalize_field(&self.language),
            characteristics.join(","),
        ]
        .join("|")
    }

    /// Deterministic fingerprint of the canonical form
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_bytes(self.canonical().as_bytes())
    }
}

/// Lowercase and collapse internal whitespace runs to single spaces
fn normalize_field(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// =============================================================================
// Tests
// =============================================================================
