#![warn(missing_docs)]

//! Filesystem-backed record cache with optional encryption at rest.
//!
//! Each record is a map of named byte-string fields persisted as a single
//! file whose name encodes the record's fingerprint and absolute expiration:
//! `<prefix><hex(fingerprint)><10-digit epoch>`. The fixed-width name lets
//! the engine discover and classify files without reading their content.
//!
//! Write path: Record → bincode → (AES-256-GCM) → temp file → atomic rename
//! Read path:  File → (decrypt) → decode → expiry check (expired or
//! undecryptable files are deleted as part of signaling the error)
//!
//! The engine keeps no in-process index; every operation re-reads the
//! directory. Writes and self-healing reads against the same fingerprint are
//! serialized by an internal per-fingerprint lock, but [`FileCache::sweep`]
//! and [`FileCache::purge`] racing foreign writers still require external
//! coordination.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod gc;
pub mod naming;
pub mod read_path;
pub mod resolver;
pub mod store;
pub mod write_path;

pub use codec::{Record, FIELD_CPT, FIELD_EXP, FIELD_KEY};
pub use crypto::CacheKey;
pub use error::{CacheError, CacheResult};
pub use gc::GcReport;
pub use store::FileCache;
