//! PBKDF2 key derivation for item secrets.
//!
//! Uses PBKDF2-HMAC-SHA256 with:
//! - 100,000 iterations
//! - 32-byte salt, freshly generated for every envelope
//! - 32-byte (256-bit) output
//!
//! The iteration count and sizes are part of the stored envelope format;
//! changing them makes previously stored blobs unreadable.

use crate::crypto::{CryptoError, Result, SecretKey, KEY_SIZE, SALT_SIZE};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

/// Number of PBKDF2 rounds applied to the user secret.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Generate a fresh random salt from the OS CSPRNG.
///
/// Fails only if the operating system cannot supply randomness.
pub fn generate_salt() -> Result<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::RandomFailed(e.to_string()))?;
    Ok(salt)
}

/// Derive a symmetric key from a user secret and salt.
///
/// Deterministic: the same `(secret, salt)` pair always yields the same key.
/// The iteration count makes brute-forcing the secret from a stolen blob
/// expensive.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> SecretKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, PBKDF2_ITERATIONS, &mut key);
    SecretKey::from_bytes(key)
}
