//! Cryptographic primitives for CipherKeep.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation from a user secret
//! - AES-256-GCM encryption/decryption
//! - The envelope format (`salt || nonce || ciphertext || tag`) used for every stored item
//! - Argon2id hashing of account credentials

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod password;

pub use cipher::{decrypt, encrypt, SecretKey};
pub use envelope::{decrypt_with_secret, encrypt_with_secret, MIN_ENVELOPE_LEN};
pub use kdf::{derive_key, generate_salt, PBKDF2_ITERATIONS};
pub use password::{hash_credential, verify_credential};

use thiserror::Error;

/// Length of the derived symmetric key in bytes.
pub const KEY_SIZE: usize = 32;
/// Length of the random salt stored at the front of every envelope.
pub const SALT_SIZE: usize = 32;
/// Length of the AES-GCM nonce.
pub const NONCE_SIZE: usize = 12;
/// Length of the AES-GCM authentication tag.
pub const TAG_SIZE: usize = 16;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong secret, wrong key, truncated or tampered data. Deliberately carries no detail.
    #[error("Authentication failed - wrong secret or corrupted data")]
    AuthenticationFailed,

    #[error("Malformed input: expected at least {expected} bytes, got {got}")]
    MalformedInput { expected: usize, got: usize },

    #[error("Random number generation failed: {0}")]
    RandomFailed(String),

    #[error("Credential hashing failed: {0}")]
    HashFailed(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
