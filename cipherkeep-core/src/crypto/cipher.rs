//! AES-256-GCM encryption and decryption.
//!
//! Uses AES-256-GCM with:
//! - 256-bit key
//! - 96-bit (12 byte) nonce, random per call
//! - 128-bit authentication tag
//!
//! Output layout of [`encrypt`] is `nonce(12) || ciphertext || tag(16)`.

use crate::crypto::{CryptoError, Result, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A symmetric key derived from a user secret.
///
/// The bytes are wiped when the key is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    key: [u8; KEY_SIZE],
}

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Encrypt `plaintext` under `key`.
///
/// A fresh nonce is drawn from the OS CSPRNG on every call, so concurrent
/// callers sharing one key never coordinate and never reuse a nonce.
pub fn encrypt(plaintext: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // aes-gcm appends the tag to the ciphertext
    let ciphertext_with_tag = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext_with_tag.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext_with_tag);
    Ok(out)
}

/// Decrypt `nonce || ciphertext || tag` produced by [`encrypt`].
///
/// Every failure, whether short input, flipped bit or wrong key, surfaces
/// as [`CryptoError::AuthenticationFailed`].
pub fn decrypt(data: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let (nonce_bytes, ciphertext_with_tag) = data.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext_with_tag)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
