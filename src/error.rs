//! Error types for the result cache

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the result cache
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Fingerprinting Errors
    // =========================================================================
    /// The fingerprint source could not be read at all.
    ///
    /// Distinct from a cache miss: a caller must see this, never an empty
    /// lookup result.
    #[error("cannot read fingerprint input {path}: {source}")]
    InputUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// A stored entry failed validation on read.
    ///
    /// Absorbed by the read path: the entry is deleted and the lookup reports
    /// a miss. Callers of `get` never observe this variant.
    #[error("corrupt cache entry {namespace}/{fingerprint}: {reason}")]
    CorruptEntry {
        namespace: String,
        fingerprint: String,
        reason: String,
    },

    /// A value was written to (or read from) the wrong namespace
    #[error("namespace mismatch: {value_kind} value targeted the {namespace} namespace")]
    NamespaceMismatch {
        namespace: String,
        value_kind: String,
    },

    // =========================================================================
    // Request-Path Errors
    // =========================================================================
    /// The caller-supplied computation failed; nothing was cached
    #[error("computation failed for {key}: {message}")]
    Compute { key: String, message: String },

    /// A waiter exceeded its budget for a shared in-flight computation.
    ///
    /// The computation itself keeps running and may still populate the cache.
    #[error("timed out after {waited:?} waiting on in-flight computation for {key}")]
    Timeout { key: String, waited: Duration },

    // =========================================================================
    // Sync Errors
    // =========================================================================
    /// A single record failed reconciliation against the price store.
    ///
    /// Isolated to that record within a sync pass; retried on the next pass.
    #[error("price store sync failed for {fingerprint}: {reason}")]
    Sync { fingerprint: String, reason: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let err = Error::Compute {
            key: "pricing/abc123".to_string(),
            message: "rate limited".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("pricing/abc123"));
        assert!(text.contains("rate limited"));
    }

    #[test]
    fn test_io_error_converts() {
        fn read() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(read(), Err(Error::Io(_))));
    }
}
