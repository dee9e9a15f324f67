//! Error types for the cache store.

use thiserror::Error;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Bad directory, prefix, key, or fingerprint configuration.
    #[error("invalid configuration: {reason}")]
    Validation {
        /// Description of the rejected configuration.
        reason: String,
    },

    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption-side failure (cipher setup or sealing).
    #[error("encryption failed: {reason}")]
    Crypto {
        /// Description of the failure.
        reason: String,
    },

    /// Authentication tag mismatch on read — the file was deleted.
    #[error("cache file '{file}' is not decryptable so deleted")]
    DecryptionAuthFailed {
        /// The deleted file name.
        file: String,
    },

    /// The record was past its TTL on read — the file was deleted.
    #[error("cache file '{file}' is expired so deleted")]
    Expired {
        /// The deleted file name.
        file: String,
    },

    /// A self-healing deletion itself failed; the stale file is still on disk.
    #[error("cache file '{file}' is {reason} but could not be deleted: {source}")]
    RemoveFailed {
        /// The file that should have been deleted.
        file: String,
        /// Why the file was slated for deletion ("expired" or "not decryptable").
        reason: &'static str,
        /// The I/O error from the failed deletion.
        #[source]
        source: std::io::Error,
    },

    /// Malformed record bytes.
    #[error("record serialization failed: {reason}")]
    Serialization {
        /// Description of the codec failure.
        reason: String,
    },

    /// No file in the directory resolves to the fingerprint.
    #[error("no cache file available for fingerprint {fingerprint}")]
    NotFound {
        /// Hex encoding of the unresolved fingerprint.
        fingerprint: String,
    },

    /// A batch operation completed with a non-empty per-file failure list.
    #[error("{operation}: {failed} file(s) could not be removed ({removed} removed)")]
    Aggregate {
        /// Which batch operation ran ("purge" or "sweep").
        operation: &'static str,
        /// Files successfully removed before completion.
        removed: u64,
        /// Files that could not be removed.
        failed: u64,
        /// The per-file errors, in encounter order.
        errors: Vec<CacheError>,
    },
}
