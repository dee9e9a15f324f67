//! Read path with self-healing deletion of expired or undecryptable files.

use std::fs;

use tracing::{debug, warn};

use crate::codec::{self, Record, FIELD_EXP};
use crate::error::{CacheError, CacheResult};
use crate::naming;
use crate::store::{unix_now, FileCache};

impl FileCache {
    /// Reads a record by filename, relative to the cache directory.
    ///
    /// A file that fails decryption or is past its TTL is deleted as part of
    /// signaling the error, and the three outcomes stay distinct:
    /// [`CacheError::DecryptionAuthFailed`] (undecryptable, deleted),
    /// [`CacheError::Expired`] (expired, deleted), and
    /// [`CacheError::RemoveFailed`] when the deletion itself failed.
    ///
    /// On success the full record is returned, reserved fields included.
    pub fn read(&self, name: &str) -> CacheResult<Record> {
        // Serialize the delete-on-failure path against writers of the same
        // fingerprint when the name parses; foreign names get no lock.
        let lock = naming::decode_name(self.prefix(), self.fingerprint_len(), name)
            .and_then(|d| hex::decode(d.fingerprint_hex).ok())
            .map(|fingerprint| self.fingerprint_lock(&fingerprint));
        let _guard = lock.as_ref().map(|l| l.lock());

        let full_path = self.path().join(name);
        let raw = fs::read(&full_path)?;

        let plain = if self.encryption_enabled() {
            let key = self.key().ok_or_else(|| CacheError::Crypto {
                reason: "encryption enabled but no key is set".to_string(),
            })?;
            match crate::crypto::decrypt(&raw, key) {
                Ok(plain) => plain,
                Err(_) => {
                    warn!(file = %name, "cache file failed authentication, removing");
                    return Err(match fs::remove_file(&full_path) {
                        Ok(()) => CacheError::DecryptionAuthFailed {
                            file: name.to_string(),
                        },
                        Err(source) => CacheError::RemoveFailed {
                            file: name.to_string(),
                            reason: "not decryptable",
                            source,
                        },
                    });
                }
            }
        } else {
            raw
        };

        // Decoding runs after decryption; with the right key a failure here
        // means a codec mismatch, not tampering, so the file is kept.
        let record = codec::decode_record(&plain)?;

        let expiry = record
            .get(FIELD_EXP)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        if expiry != 0 && expiry < unix_now() {
            debug!(file = %name, expiry, "cache file expired, removing");
            return Err(match fs::remove_file(&full_path) {
                Ok(()) => CacheError::Expired {
                    file: name.to_string(),
                },
                Err(source) => CacheError::RemoveFailed {
                    file: name.to_string(),
                    reason: "expired",
                    source,
                },
            });
        }

        Ok(record)
    }
}
