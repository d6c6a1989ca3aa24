//! Argon2id hashing of account credentials.
//!
//! Login passwords never reach the item store; the identity directory keeps
//! only the PHC string produced here.

use crate::crypto::{CryptoError, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a login password into a self-describing PHC string.
pub fn hash_credential(password: &[u8]) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CryptoError::HashFailed(format!("Failed to encode salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password, &salt)
        .map_err(|e| CryptoError::HashFailed(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check a login password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; errors only when the stored hash is unreadable.
pub fn verify_credential(password: &[u8], stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| CryptoError::HashFailed(format!("Invalid stored hash: {}", e)))?;

    Ok(Argon2::default().verify_password(password, &parsed).is_ok())
}
