//! AES-256-GCM encryption at rest with SHA-256 key derivation.
//!
//! The on-disk layout of an encrypted payload is `nonce ‖ ciphertext+tag`,
//! with a fresh random 12-byte nonce per encryption. Key material of any
//! length is reduced to a 32-byte key by SHA-256; random material comes from
//! the operating system CSPRNG.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CacheError, CacheResult};

/// Nonce length for AES-GCM (96-bit).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length for AES-GCM (128-bit).
pub const TAG_LEN: usize = 16;

/// 256-bit derived encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CacheKey(pub(crate) [u8; 32]);

impl std::fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheKey([REDACTED])")
    }
}

/// Derives a fixed-size key from arbitrary-length key material.
pub fn derive_key(material: &[u8]) -> CacheKey {
    CacheKey(Sha256::digest(material).into())
}

/// Generates 32 bytes of fresh key material from the OS CSPRNG.
pub fn generate_key_material() -> Vec<u8> {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.to_vec()
}

/// Encrypts a plaintext, prepending the random nonce to the sealed bytes.
pub fn encrypt(plaintext: &[u8], key: &CacheKey) -> CacheResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|e| CacheError::Crypto {
        reason: e.to_string(),
    })?;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CacheError::Crypto {
            reason: e.to_string(),
        })?;
    let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&ciphertext);
    Ok(payload)
}

/// Decrypts a `nonce ‖ ciphertext+tag` payload.
///
/// Fails on payloads shorter than the nonce+tag overhead and on any
/// authentication mismatch; corrupted data is never returned silently.
pub fn decrypt(payload: &[u8], key: &CacheKey) -> CacheResult<Vec<u8>> {
    if payload.len() < NONCE_LEN + TAG_LEN {
        return Err(CacheError::Crypto {
            reason: format!(
                "payload of {} bytes is shorter than the {} byte nonce+tag overhead",
                payload.len(),
                NONCE_LEN + TAG_LEN
            ),
        });
    }
    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|e| CacheError::Crypto {
        reason: e.to_string(),
    })?;
    let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
    cipher
        .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CacheError::Crypto {
            reason: "authentication tag mismatch (wrong key or corrupted data)".to_string(),
        })
}
