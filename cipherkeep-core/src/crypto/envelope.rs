//! Envelope encryption: secret in, self-contained blob out.
//!
//! Wire format:
//!
//! ```text
//! salt(32) || nonce(12) || ciphertext || tag(16)
//! ```
//!
//! The salt feeds the key derivation, so a blob carries everything needed to
//! decrypt it given the original secret. No plaintext metadata is included.

use crate::crypto::{cipher, kdf, CryptoError, Result, NONCE_SIZE, SALT_SIZE};

/// Shortest input [`decrypt_with_secret`] will try to open.
pub const MIN_ENVELOPE_LEN: usize = SALT_SIZE + NONCE_SIZE;

/// Seal `plaintext` under a key derived from `secret` and a fresh salt.
pub fn encrypt_with_secret(plaintext: &[u8], secret: &[u8]) -> Result<Vec<u8>> {
    let salt = kdf::generate_salt()?;
    let key = kdf::derive_key(secret, &salt);
    let sealed = cipher::encrypt(plaintext, &key)?;

    let mut blob = Vec::with_capacity(SALT_SIZE + sealed.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Open a blob produced by [`encrypt_with_secret`].
///
/// Returns [`CryptoError::MalformedInput`] when the blob cannot even hold a
/// salt and nonce; any other mismatch, including a wrong secret, is
/// [`CryptoError::AuthenticationFailed`].
pub fn decrypt_with_secret(blob: &[u8], secret: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < MIN_ENVELOPE_LEN {
        return Err(CryptoError::MalformedInput {
            expected: MIN_ENVELOPE_LEN,
            got: blob.len(),
        });
    }

    let (salt, sealed) = blob.split_at(SALT_SIZE);
    let key = kdf::derive_key(secret, salt);
    cipher::decrypt(sealed, &key)
}
