//! Garbage collection: unconditional purge and validating sweep.

use std::fs;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::{FIELD_EXP, FIELD_KEY};
use crate::error::{CacheError, CacheResult};
use crate::naming;
use crate::store::{unix_now, FileCache};

/// Counts from a completed purge or sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcReport {
    /// Files removed.
    pub removed: u64,
    /// Files that matched but could not be removed.
    pub failed: u64,
}

impl FileCache {
    /// Unconditionally deletes every file matching the record pattern.
    ///
    /// Hidden (dot-prefixed) variants of the pattern are removed too. No
    /// validity check is performed: a fresh, unexpired, correctly-encrypted
    /// record goes with the rest. Per-file failures do not stop the pass; a
    /// file already gone when the delete lands is counted as removed.
    /// If any failure was recorded the result is [`CacheError::Aggregate`]
    /// carrying the counts and the per-file errors.
    pub fn purge(&self) -> CacheResult<GcReport> {
        let mut report = GcReport::default();
        let mut errors = Vec::new();

        for entry in fs::read_dir(self.path())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !naming::matches_pattern(self.prefix(), self.fingerprint_len(), name) {
                continue;
            }
            remove_counted(&entry.path(), &mut report, &mut errors);
        }

        debug!(removed = report.removed, failed = report.failed, "purge complete");
        finish("purge", report, errors)
    }

    /// Deletes invalid, inconsistent, or expired files; keeps valid ones.
    ///
    /// Per file, a cheap decision comes first: a name whose epoch segment is
    /// nonzero and past means the file is stale, no read needed. Everything
    /// else takes the full read path, and the record must decode, carry a
    /// `_key_` matching the name's fingerprint segment, and an `_exp_`
    /// matching the name's epoch segment. Any mismatch, decode failure, or
    /// expiry deletes the file. Result shape is identical to
    /// [`FileCache::purge`].
    pub fn sweep(&self) -> CacheResult<GcReport> {
        let now = unix_now();
        let mut report = GcReport::default();
        let mut errors = Vec::new();

        for entry in fs::read_dir(self.path())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(decoded) = naming::decode_name(self.prefix(), self.fingerprint_len(), name)
            else {
                continue;
            };
            let path = entry.path();

            // Expired by name alone: no need to read the file.
            if decoded.expiry != 0 && decoded.expiry < now {
                remove_counted(&path, &mut report, &mut errors);
                continue;
            }

            let consistent = match self.read(name) {
                Ok(record) => {
                    let key_matches = record
                        .get(FIELD_KEY)
                        .map(hex::encode)
                        .as_deref()
                        == Some(decoded.fingerprint_hex);
                    let exp_matches = record
                        .get(FIELD_EXP)
                        .and_then(|v| std::str::from_utf8(v).ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        == Some(decoded.expiry);
                    key_matches && exp_matches
                }
                // Read already self-healed the file.
                Err(CacheError::Expired { .. }) | Err(CacheError::DecryptionAuthFailed { .. }) => {
                    report.removed += 1;
                    continue;
                }
                // Raced with another deleter: benign, nothing to count.
                Err(CacheError::Io(e)) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(err @ CacheError::RemoveFailed { .. }) => {
                    report.failed += 1;
                    errors.push(err);
                    continue;
                }
                // Undecodable or otherwise unreadable content is invalid.
                Err(err) => {
                    warn!(file = %name, error = %err, "sweep found invalid record");
                    false
                }
            };

            if !consistent {
                remove_counted(&path, &mut report, &mut errors);
            }
        }

        debug!(removed = report.removed, failed = report.failed, "sweep complete");
        finish("sweep", report, errors)
    }
}

/// Deletes one file, counting a missing file as removed (benign race).
fn remove_counted(path: &std::path::Path, report: &mut GcReport, errors: &mut Vec<CacheError>) {
    match fs::remove_file(path) {
        Ok(()) => report.removed += 1,
        Err(e) if e.kind() == io::ErrorKind::NotFound => report.removed += 1,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove cache file");
            report.failed += 1;
            errors.push(CacheError::Io(e));
        }
    }
}

fn finish(
    operation: &'static str,
    report: GcReport,
    errors: Vec<CacheError>,
) -> CacheResult<GcReport> {
    if errors.is_empty() {
        Ok(report)
    } else {
        Err(CacheError::Aggregate {
            operation,
            removed: report.removed,
            failed: report.failed,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_record, Record, FIELD_CPT};
    use crate::naming::encode_name;
    use tempfile::tempdir;

    fn cache_with_width(dir: &std::path::Path, width: usize) -> FileCache {
        let mut cache = FileCache::open(dir).unwrap();
        cache.set_fingerprint_len(width).unwrap();
        cache
    }

    fn payload() -> Record {
        let mut record = Record::new();
        record.insert("usr".to_string(), b"alice".to_vec());
        record
    }

    /// Writes a record file with chosen name-epoch and field overrides.
    fn plant(
        cache: &FileCache,
        fingerprint: &[u8],
        name_expiry: u64,
        field_key: &[u8],
        field_expiry: u64,
    ) -> String {
        let mut record = payload();
        record.insert(FIELD_KEY.to_string(), field_key.to_vec());
        record.insert(FIELD_EXP.to_string(), field_expiry.to_string().into_bytes());
        record.insert(FIELD_CPT.to_string(), b"1".to_vec());
        let bytes = encode_record(&record).unwrap();
        let name = encode_name(cache.prefix(), fingerprint, name_expiry);
        fs::write(cache.path().join(&name), bytes).unwrap();
        name
    }

    fn matching_files(cache: &FileCache) -> usize {
        fs::read_dir(cache.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .is_some_and(|n| naming::matches_pattern(cache.prefix(), cache.fingerprint_len(), n))
            })
            .count()
    }

    #[test]
    fn purge_removes_all_matching_files() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        for i in 0..5u8 {
            cache.write(&[i; 4], payload(), u64::from(i) * 60).unwrap();
        }

        let report = cache.purge().unwrap();
        assert_eq!(report, GcReport { removed: 5, failed: 0 });
        assert_eq!(matching_files(&cache), 0);
    }

    #[test]
    fn purge_removes_hidden_variants_and_skips_foreign_names() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        let hidden = format!(".{}", encode_name(cache.prefix(), &[0x01; 4], 0));
        fs::write(dir.path().join(&hidden), b"x").unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let report = cache.purge().unwrap();
        assert_eq!(report.removed, 1);
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn purge_on_empty_directory_is_clean() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        assert_eq!(cache.purge().unwrap(), GcReport::default());
    }

    #[test]
    fn sweep_removes_expired_by_name_alone() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        let past = unix_now() - 100;
        // Content is garbage on purpose: the fast path must not read it.
        let name = encode_name(cache.prefix(), &[0x02; 4], past);
        fs::write(dir.path().join(&name), b"garbage").unwrap();

        let report = cache.sweep().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join(&name).exists());
    }

    #[test]
    fn sweep_removes_fingerprint_mismatch() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        let name = plant(&cache, &[0x03; 4], 0, &[0x99; 4], 0);

        let report = cache.sweep().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join(&name).exists());
    }

    #[test]
    fn sweep_removes_epoch_mismatch() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        let future = unix_now() + 3600;
        let name = plant(&cache, &[0x04; 4], future, &[0x04; 4], future + 1);

        let report = cache.sweep().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join(&name).exists());
    }

    #[test]
    fn sweep_removes_undecodable_content() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        let name = encode_name(cache.prefix(), &[0x05; 4], 0);
        fs::write(dir.path().join(&name), [0xff; 11]).unwrap();

        let report = cache.sweep().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join(&name).exists());
    }

    #[test]
    fn sweep_keeps_valid_records() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        let never = cache.write(&[0x06; 4], payload(), 0).unwrap();
        let bounded = cache.write(&[0x07; 4], payload(), 3600).unwrap();

        let report = cache.sweep().unwrap();
        assert_eq!(report, GcReport::default());
        assert!(dir.path().join(&never).exists());
        assert!(dir.path().join(&bounded).exists());
    }

    #[test]
    fn sweep_keeps_valid_encrypted_records_and_drops_foreign_key_ones() {
        let dir = tempdir().unwrap();
        let mut cache = cache_with_width(dir.path(), 4);
        cache.set_key(b"key one");
        cache.enable_encryption();
        let foreign = cache.write(&[0x08; 4], payload(), 0).unwrap();

        cache.set_key(b"key two");
        cache.enable_encryption();
        let valid = cache.write(&[0x09; 4], payload(), 0).unwrap();

        let report = cache.sweep().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join(&foreign).exists());
        assert!(dir.path().join(&valid).exists());
    }

    #[test]
    fn sweep_ignores_non_matching_names() {
        let dir = tempdir().unwrap();
        let cache = cache_with_width(dir.path(), 4);
        fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        assert_eq!(cache.sweep().unwrap(), GcReport::default());
        assert!(dir.path().join("unrelated.txt").exists());
    }
}
