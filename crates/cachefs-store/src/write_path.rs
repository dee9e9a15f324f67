//! Write path: record → codec → (encrypt) → temp file → atomic rename.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;

use tracing::debug;

use crate::codec::{self, Record, FIELD_CPT, FIELD_EXP, FIELD_KEY};
use crate::crypto;
use crate::error::{CacheError, CacheResult};
use crate::naming::{self, MAX_EPOCH};
use crate::store::{unix_now, FileCache};

impl FileCache {
    /// Persists a record under its fingerprint, returning the filename.
    ///
    /// `ttl_secs == 0` means the record never expires; otherwise expiration
    /// is `now + ttl_secs`. The reserved fields `_key_`, `_exp_`, and
    /// `_cpt_` are injected, overwriting any caller-supplied values under
    /// those names.
    ///
    /// A prior file with the exact same name (same fingerprint, same
    /// expiration second) is replaced. Files for the same fingerprint with a
    /// different expiration are left alone; [`FileCache::sweep`] or
    /// [`FileCache::purge`] reclaims them.
    pub fn write(&self, fingerprint: &[u8], mut record: Record, ttl_secs: u64) -> CacheResult<String> {
        if fingerprint.len() != self.fingerprint_len() {
            return Err(CacheError::Validation {
                reason: format!(
                    "fingerprint is {} bytes, store is configured for {}",
                    fingerprint.len(),
                    self.fingerprint_len()
                ),
            });
        }

        let expiry = if ttl_secs == 0 {
            0
        } else {
            unix_now().checked_add(ttl_secs).unwrap_or(u64::MAX)
        };
        if expiry > MAX_EPOCH {
            return Err(CacheError::Validation {
                reason: format!("expiration {expiry} exceeds the 10-digit epoch range"),
            });
        }

        record.insert(FIELD_KEY.to_string(), fingerprint.to_vec());
        record.insert(FIELD_EXP.to_string(), expiry.to_string().into_bytes());
        record.insert(FIELD_CPT.to_string(), b"1".to_vec());

        let mut payload = codec::encode_record(&record)?;
        if self.encryption_enabled() {
            let key = self.key().ok_or_else(|| CacheError::Crypto {
                reason: "encryption enabled but no key is set".to_string(),
            })?;
            payload = crypto::encrypt(&payload, key)?;
        }

        let name = naming::encode_name(self.prefix(), fingerprint, expiry);
        let lock = self.fingerprint_lock(fingerprint);
        let _guard = lock.lock();
        self.write_atomic(&name, &payload)?;

        debug!(file = %name, bytes = payload.len(), ttl_secs, "wrote cache record");
        Ok(name)
    }

    /// Writes the payload to a temp file and renames it into place, so a
    /// crash mid-write never leaves a truncated file readable as complete.
    fn write_atomic(&self, name: &str, payload: &[u8]) -> CacheResult<()> {
        let final_path = self.path().join(name);
        // The suffix keeps the temp name outside the record pattern.
        let tmp_path = self.path().join(format!(".{name}.tmp"));

        let result = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)
            .and_then(|mut file| {
                file.write_all(payload)?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp_path, &final_path));

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}
