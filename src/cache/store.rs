//! Cache Store - Durable Key/Value Engine
//!
//! One JSON file per entry at `<root>/<namespace>/<fingerprint>.json`.
//! Writes go to a uniquely-named temp file and are renamed into place, so a
//! crash mid-write never leaves a torn entry visible and the last rename for
//! a key determines the value subsequent readers observe. No store-wide
//! lock: the filesystem provides overwrite-by-key linearization.
//!
//! Reads enforce TTL lazily (an expired entry is deleted and reported as a
//! miss) and self-heal corruption: a record that fails deserialization or
//! structural validation is deleted on first contact and never surfaced.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheValue, EntrySource, Namespace};
use super::fingerprint::Fingerprint;
use super::stats::StatsCollector;
use crate::config::CacheConfig;
use crate::error::{Error, Result};

const ENTRY_EXT: &str = "json";

/// Durable, namespace-partitioned result store
pub struct CacheStore {
    config: CacheConfig,
    stats: Arc<StatsCollector>,
    /// Distinguishes temp files of concurrent writers to the same key
    tmp_counter: AtomicU64,
}

impl CacheStore {
    /// Open a store rooted at `config.root`, creating the namespace
    /// directory tree if needed.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        for namespace in Namespace::ALL {
            tokio::fs::create_dir_all(config.root.join(namespace.dir_name())).await?;
        }
        debug!(root = %config.root.display(), "cache store opened");
        Ok(Self {
            config,
            stats: Arc::new(StatsCollector::new()),
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// The configuration this store was opened with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Shared statistics collector
    pub fn stats(&self) -> Arc<StatsCollector> {
        Arc::clone(&self.stats)
    }

    fn entry_path(&self, namespace: Namespace, fingerprint: &Fingerprint) -> PathBuf {
        self.config
            .root
            .join(namespace.dir_name())
            .join(format!("{}.{ENTRY_EXT}", fingerprint.as_str()))
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Look up an entry.
    ///
    /// Returns `None` both when no entry exists and when the stored entry's
    /// TTL has elapsed; the two are indistinguishable by design. Expired and
    /// corrupt records are removed as a side effect.
    pub async fn get(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheEntry>> {
        let Some(entry) = self.read_valid(namespace, fingerprint).await? else {
            return Ok(None);
        };

        if entry.is_expired_at(Utc::now()) {
            debug!(key = %entry.key(), "entry expired, removing");
            self.remove_file(namespace, fingerprint).await?;
            self.stats.record_eviction(namespace);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Read and structurally validate an entry, without TTL enforcement.
    ///
    /// Corruption is absorbed here: the bad record is deleted, counted as an
    /// eviction, and reported as absent.
    async fn read_valid(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(namespace, fingerprint);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let parsed: std::result::Result<CacheEntry, _> = serde_json::from_slice(&bytes);
        let corrupt = match parsed {
            Ok(entry) => match entry.validate(namespace, fingerprint) {
                Ok(()) => return Ok(Some(entry)),
                Err(err) => err,
            },
            Err(err) => Error::CorruptEntry {
                namespace: namespace.to_string(),
                fingerprint: fingerprint.to_string(),
                reason: err.to_string(),
            },
        };

        warn!(%corrupt, "removing corrupt cache entry");
        self.remove_file(namespace, fingerprint).await?;
        self.stats.record_eviction(namespace);
        Ok(None)
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Insert or unconditionally overwrite an entry, stamped with the current
    /// time and the namespace's configured TTL.
    pub async fn set(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        value: CacheValue,
        source: EntrySource,
    ) -> Result<()> {
        let entry = CacheEntry::new(
            namespace,
            fingerprint.clone(),
            value,
            self.config.ttl_for(namespace),
            source,
        )?;
        self.put_entry(&entry).await
    }

    /// Persist a fully-formed entry, preserving its timestamps.
    ///
    /// Used by the sync engine, which controls `created_at` and `source`
    /// explicitly.
    pub(crate) async fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(entry.namespace, &entry.fingerprint);
        let tmp = path.with_extension(format!(
            "{ENTRY_EXT}.tmp{}",
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let bytes = serde_json::to_vec(entry)?;
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        debug!(key = %entry.key(), source = ?entry.source, "entry written");
        Ok(())
    }

    /// Delete an entry. Deleting an absent key is not an error.
    pub async fn delete(&self, namespace: Namespace, fingerprint: &Fingerprint) -> Result<()> {
        self.remove_file(namespace, fingerprint).await
    }

    async fn remove_file(&self, namespace: Namespace, fingerprint: &Fingerprint) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(namespace, fingerprint)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    // =========================================================================
    // Scans & Maintenance
    // =========================================================================

    /// Begin a lazy scan over one namespace.
    ///
    /// The directory listing is snapshotted at call time; entries are read
    /// one at a time as the scan advances. Corrupt records are removed and
    /// skipped. Expired entries ARE yielded: sync and maintenance need to
    /// see records past their TTL.
    pub async fn scan_namespace(&self, namespace: Namespace) -> Result<NamespaceScan<'_>> {
        let dir = self.config.root.join(namespace.dir_name());
        let mut pending = VecDeque::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(dirent) = read_dir.next_entry().await? {
            let path = dirent.path();
            if path.extension().map_or(true, |ext| ext != ENTRY_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(fingerprint) = Fingerprint::from_hex(stem) {
                pending.push_back(fingerprint);
            }
        }
        Ok(NamespaceScan {
            store: self,
            namespace,
            pending,
        })
    }

    /// Remove every expired entry in one namespace; returns how many were
    /// swept.
    pub async fn cleanup_expired(&self, namespace: Namespace) -> Result<u64> {
        let now = Utc::now();
        let mut scan = self.scan_namespace(namespace).await?;
        let mut removed = 0u64;
        while let Some(entry) = scan.next().await? {
            if entry.is_expired_at(now) {
                self.remove_file(namespace, &entry.fingerprint).await?;
                self.stats.record_eviction(namespace);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(%namespace, removed, "expired entries swept");
        }
        Ok(removed)
    }

    /// On-disk accounting for one namespace, for operational reporting
    pub async fn namespace_report(&self, namespace: Namespace) -> Result<NamespaceReport> {
        let now = Utc::now();
        let mut scan = self.scan_namespace(namespace).await?;
        let mut report = NamespaceReport {
            namespace,
            entries: 0,
            expired: 0,
            bytes: 0,
        };
        while let Some(entry) = scan.next().await? {
            report.entries += 1;
            if entry.is_expired_at(now) {
                report.expired += 1;
            }
            let path = self.entry_path(namespace, &entry.fingerprint);
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                report.bytes += meta.len();
            }
        }
        Ok(report)
    }
}

/// A lazy, restartable traversal of one namespace.
///
/// Finite: terminates once the listing snapshot taken at creation has been
/// exhausted. Entries written mid-scan may or may not be observed.
pub struct NamespaceScan<'a> {
    store: &'a CacheStore,
    namespace: Namespace,
    pending: VecDeque<Fingerprint>,
}

impl NamespaceScan<'_> {
    /// Next structurally valid entry, or `None` once exhausted
    pub async fn next(&mut self) -> Result<Option<CacheEntry>> {
        while let Some(fingerprint) = self.pending.pop_front() {
            // Corrupt or concurrently-deleted records are skipped, not
            // surfaced.
            if let Some(entry) = self.store.read_valid(self.namespace, &fingerprint).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Entries not yet visited (upper bound; some may prove corrupt)
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

/// On-disk accounting for one namespace
#[derive(Debug, Clone, serde::Serialize)]
pub struct NamespaceReport {
    pub namespace: Namespace,
    pub entries: u64,
    pub expired: u64,
    pub bytes: u64,
}

// =============================================================================
// Tests
// =============================================================================
