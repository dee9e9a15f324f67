//! The store handle: directory, prefix, key, and encryption configuration.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::crypto::{self, CacheKey};
use crate::error::{CacheError, CacheResult};

/// Default filename prefix.
pub const DEFAULT_PREFIX: &str = "dsk_";

/// Default fingerprint width in bytes (a SHA-512 digest, 128 hex chars).
pub const DEFAULT_FINGERPRINT_LEN: usize = 64;

const PREFIX_MIN_LEN: usize = 3;
const PREFIX_MAX_LEN: usize = 49;

/// Handle on one cache directory.
///
/// Holds the directory path, filename prefix, fingerprint width, derived
/// encryption key, and encryption flag. Configuration setters are the only
/// mutation points and are not safe for concurrent use; the record
/// operations (`write`, `read`, `resolve`, `purge`, `sweep`) take `&self`.
pub struct FileCache {
    path: PathBuf,
    prefix: String,
    fingerprint_len: usize,
    key: Option<CacheKey>,
    encrypt: bool,
    locks: DashMap<Vec<u8>, Arc<Mutex<()>>>,
}

impl FileCache {
    /// Opens a cache directory, creating it if missing.
    ///
    /// The path must be absolute and writable; a probe file is created and
    /// removed to verify writability up front rather than on first write.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CacheError::Validation {
                reason: "path name is empty".to_string(),
            });
        }
        if !path.is_absolute() {
            return Err(CacheError::Validation {
                reason: format!("path {} is not absolute", path.display()),
            });
        }
        match fs::metadata(path) {
            Ok(meta) if !meta.is_dir() => {
                return Err(CacheError::Validation {
                    reason: format!("path {} is not a directory", path.display()),
                });
            }
            Ok(_) => {}
            Err(_) => fs::create_dir_all(path)?,
        }
        probe_writable(path)?;

        debug!(path = %path.display(), "opened cache directory");
        Ok(Self {
            path: path.to_path_buf(),
            prefix: DEFAULT_PREFIX.to_string(),
            fingerprint_len: DEFAULT_FINGERPRINT_LEN,
            key: None,
            encrypt: false,
            locks: DashMap::new(),
        })
    }

    /// Returns the cache directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current filename prefix, trailing separator included.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sets the filename prefix: 3 to 49 alphanumeric characters plus a
    /// trailing `_`.
    pub fn set_prefix(&mut self, prefix: &str) -> CacheResult<()> {
        let Some(body) = prefix.strip_suffix('_') else {
            return Err(invalid_prefix(prefix));
        };
        if body.len() < PREFIX_MIN_LEN || body.len() > PREFIX_MAX_LEN {
            return Err(invalid_prefix(prefix));
        }
        if !body.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid_prefix(prefix));
        }
        self.prefix = prefix.to_string();
        Ok(())
    }

    /// Returns the fingerprint width in bytes.
    pub fn fingerprint_len(&self) -> usize {
        self.fingerprint_len
    }

    /// Sets the fingerprint width in bytes.
    ///
    /// The width is fixed per deployment: all files in one directory must
    /// share it, and the write, resolve, purge, and sweep patterns all
    /// derive from it.
    pub fn set_fingerprint_len(&mut self, len: usize) -> CacheResult<()> {
        if len == 0 {
            return Err(CacheError::Validation {
                reason: "fingerprint length must be non-zero".to_string(),
            });
        }
        self.fingerprint_len = len;
        Ok(())
    }

    /// Sets the encryption key from caller-supplied material.
    ///
    /// Empty material clears the key and disables encryption.
    pub fn set_key(&mut self, material: &[u8]) {
        if material.is_empty() {
            self.key = None;
            self.encrypt = false;
        } else {
            self.key = Some(crypto::derive_key(material));
        }
    }

    /// Generates random key material, derives the key from it, and returns
    /// the material so the caller can persist it.
    pub fn set_random_key(&mut self) -> Vec<u8> {
        let material = crypto::generate_key_material();
        self.key = Some(crypto::derive_key(&material));
        material
    }

    /// Enables encryption if a key is set; returns the resulting state.
    pub fn enable_encryption(&mut self) -> bool {
        self.encrypt = self.key.is_some();
        self.encrypt
    }

    /// Disables encryption; the key, if any, is kept.
    pub fn disable_encryption(&mut self) -> bool {
        self.encrypt = false;
        self.encrypt
    }

    /// Returns whether records are encrypted on write and decrypted on read.
    pub fn encryption_enabled(&self) -> bool {
        self.encrypt
    }

    pub(crate) fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    /// Returns the lock serializing operations on one fingerprint.
    ///
    /// Held across write and across the self-healing deletion in read, so
    /// two handles in the same process cannot interleave a replace with a
    /// delete-then-recreate on the same file.
    pub(crate) fn fingerprint_lock(&self, fingerprint: &[u8]) -> Arc<Mutex<()>> {
        self.locks
            .entry(fingerprint.to_vec())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn invalid_prefix(prefix: &str) -> CacheError {
    CacheError::Validation {
        reason: format!("prefix '{prefix}' is invalid"),
    }
}

fn probe_writable(path: &Path) -> CacheResult<()> {
    let probe = path.join(".cachefs_probe");
    match OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(e) => Err(CacheError::Validation {
            reason: format!("directory {} is not writable: {e}", path.display()),
        }),
    }
}

/// Current wall clock as epoch seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_rejects_relative_path() {
        let result = FileCache::open("relative/dir");
        assert!(matches!(result, Err(CacheError::Validation { .. })));
    }

    #[test]
    fn open_rejects_empty_path() {
        assert!(FileCache::open("").is_err());
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/cache");
        let cache = FileCache::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(cache.path(), nested);
        assert_eq!(cache.prefix(), DEFAULT_PREFIX);
        assert_eq!(cache.fingerprint_len(), DEFAULT_FINGERPRINT_LEN);
        assert!(!cache.encryption_enabled());
    }

    #[test]
    fn open_rejects_file_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileCache::open(&file),
            Err(CacheError::Validation { .. })
        ));
    }

    #[test]
    fn prefix_validation() {
        let dir = tempdir().unwrap();
        let mut cache = FileCache::open(dir.path()).unwrap();

        cache.set_prefix("abc_").unwrap();
        assert_eq!(cache.prefix(), "abc_");
        cache.set_prefix("Cache01_").unwrap();

        assert!(cache.set_prefix("ab_").is_err()); // too short
        assert!(cache.set_prefix(&format!("{}_", "a".repeat(50))).is_err()); // too long
        assert!(cache.set_prefix("abc").is_err()); // no separator
        assert!(cache.set_prefix("a-c_").is_err()); // bad charset
        assert_eq!(cache.prefix(), "Cache01_");
    }

    #[test]
    fn fingerprint_len_must_be_nonzero() {
        let dir = tempdir().unwrap();
        let mut cache = FileCache::open(dir.path()).unwrap();
        assert!(cache.set_fingerprint_len(0).is_err());
        cache.set_fingerprint_len(32).unwrap();
        assert_eq!(cache.fingerprint_len(), 32);
    }

    #[test]
    fn encryption_requires_a_key() {
        let dir = tempdir().unwrap();
        let mut cache = FileCache::open(dir.path()).unwrap();

        assert!(!cache.enable_encryption());

        cache.set_key(b"material");
        assert!(cache.enable_encryption());
        assert!(cache.encryption_enabled());

        assert!(!cache.disable_encryption());
        assert!(!cache.encryption_enabled());
    }

    #[test]
    fn empty_key_material_clears_key_and_disables() {
        let dir = tempdir().unwrap();
        let mut cache = FileCache::open(dir.path()).unwrap();
        cache.set_key(b"material");
        assert!(cache.enable_encryption());

        cache.set_key(b"");
        assert!(!cache.encryption_enabled());
        assert!(!cache.enable_encryption());
    }

    #[test]
    fn random_key_material_is_returned_and_usable() {
        let dir = tempdir().unwrap();
        let mut cache = FileCache::open(dir.path()).unwrap();
        let material = cache.set_random_key();
        assert_eq!(material.len(), 32);
        assert!(cache.enable_encryption());
    }

    #[test]
    fn fingerprint_locks_are_shared_per_fingerprint() {
        let dir = tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let a = cache.fingerprint_lock(b"fp-1");
        let b = cache.fingerprint_lock(b"fp-1");
        let c = cache.fingerprint_lock(b"fp-2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
