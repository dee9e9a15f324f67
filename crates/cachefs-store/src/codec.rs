//! On-disk record serialization.
//!
//! A record is a map of field name to raw byte value, serialized with
//! bincode. The format is opaque to the rest of the engine; values are
//! arbitrary binary, including empty.

use std::collections::HashMap;

use crate::error::{CacheError, CacheResult};

/// Reserved field holding the authoritative copy of the fingerprint bytes.
pub const FIELD_KEY: &str = "_key_";

/// Reserved field holding the expiration epoch as a decimal string;
/// `"0"` means never expires.
pub const FIELD_EXP: &str = "_exp_";

/// Reserved counter field, written as `"1"` and never read back.
pub const FIELD_CPT: &str = "_cpt_";

/// A cache record: field name to byte-string value, insertion order
/// irrelevant. Fields other than the reserved three are caller payload.
pub type Record = HashMap<String, Vec<u8>>;

/// Serializes a record to its on-disk byte form.
pub fn encode_record(record: &Record) -> CacheResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })
}

/// Deserializes on-disk bytes back into a record.
pub fn decode_record(bytes: &[u8]) -> CacheResult<Record> {
    bincode::deserialize(bytes).map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })
}
