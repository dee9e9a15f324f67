//! Fingerprint-to-filename resolution.

use std::fs;

use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::naming::{EPOCH_LEN, NEVER_EXPIRES};
use crate::store::FileCache;

impl FileCache {
    /// Finds the filename holding the record for a fingerprint.
    ///
    /// Several files may exist for one fingerprint with different
    /// expirations; a write does not erase prior ones. A never-expiring file
    /// wins outright. Otherwise the byte-wise largest name wins, which the
    /// fixed-width zero-padded epoch segment makes equivalent to "furthest
    /// future expiration" — most recently created for a constant TTL.
    pub fn resolve(&self, fingerprint: &[u8]) -> CacheResult<String> {
        let stem = format!("{}{}", self.prefix(), hex::encode(fingerprint));
        let never = format!("{stem}{NEVER_EXPIRES}");

        let mut best: Option<String> = None;
        for entry in fs::read_dir(self.path())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(epoch) = name.strip_prefix(&stem) else {
                continue;
            };
            if epoch.len() != EPOCH_LEN || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if name == never {
                debug!(file = %name, "resolved never-expiring record");
                return Ok(name.to_string());
            }
            if best.as_deref().is_none_or(|b| name > b) {
                best = Some(name.to_string());
            }
        }

        best.ok_or_else(|| CacheError::NotFound {
            fingerprint: hex::encode(fingerprint),
        })
    }
}
