//! Filename encoding for cache records.
//!
//! A record file is named `<prefix><hex(fingerprint)><10-digit epoch>`. The
//! epoch segment is zero-padded so byte-wise filename ordering coincides with
//! numeric expiry ordering; the resolver's "last wins" tie-break depends on
//! this padding.

/// Width of the epoch segment in characters.
pub const EPOCH_LEN: usize = 10;

/// Largest expiration encodable in the fixed-width epoch segment (year 2286).
pub const MAX_EPOCH: u64 = 9_999_999_999;

/// Epoch segment of a record that never expires.
pub const NEVER_EXPIRES: &str = "0000000000";

/// The fingerprint and expiry recovered from a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedName<'a> {
    /// Hex fingerprint segment, `2 * fingerprint_len` characters.
    pub fingerprint_hex: &'a str,
    /// Absolute expiration in epoch seconds; 0 means never expires.
    pub expiry: u64,
}

/// Encodes a record filename from its parts.
pub fn encode_name(prefix: &str, fingerprint: &[u8], expiry: u64) -> String {
    format!("{prefix}{}{expiry:0>10}", hex::encode(fingerprint))
}

/// Decodes a filename produced by [`encode_name`].
///
/// Matching is fixed-width: the prefix, exactly `2 * fingerprint_len` hex
/// characters, then exactly [`EPOCH_LEN`] decimal digits and nothing after.
/// Returns `None` for any name outside that shape.
pub fn decode_name<'a>(
    prefix: &str,
    fingerprint_len: usize,
    name: &'a str,
) -> Option<DecodedName<'a>> {
    let rest = name.strip_prefix(prefix)?;
    if !rest.is_ascii() {
        return None;
    }
    let hex_len = fingerprint_len.checked_mul(2)?;
    if rest.len() != hex_len + EPOCH_LEN {
        return None;
    }
    let (fingerprint_hex, epoch) = rest.split_at(hex_len);
    if !fingerprint_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    if !epoch.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(DecodedName {
        fingerprint_hex,
        expiry: epoch.parse().ok()?,
    })
}

/// Checks a name against the generic record pattern for any fingerprint.
///
/// Purge also removes hidden variants, so one leading `.` is accepted.
pub fn matches_pattern(prefix: &str, fingerprint_len: usize, name: &str) -> bool {
    let name = name.strip_prefix('.').unwrap_or(name);
    decode_name(prefix, fingerprint_len, name).is_some()
}
