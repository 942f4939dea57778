//! Cryptographic primitives for the vault protocol.
//!
//! This module provides:
//! - SHA3-256 hashing
//! - AES-256-CBC encryption keyed through PBKDF2 by hex-encoded hashes
//! - Password and security-answer credential derivation

pub mod cipher;
pub mod kdf;

pub use cipher::{
    decrypt, encrypt, key_from_hash, VaultCipher, KEY_LEN, PBKDF2_ITERATIONS, SALT, SALT_LEN,
};
pub use kdf::{BackupCredentials, PasswordCredentials, ANSWER_SEPARATOR};

use sha3::{Digest, Sha3_256};
use thiserror::Error;

/// Length of a SHA3-256 digest in bytes.
pub const HASH_LEN: usize = 32;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid salt length: expected {expected}, got {got}")]
    InvalidSaltLength { expected: usize, got: usize },

    #[error("Invalid hash: {0}")]
    InvalidHash(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Hash arbitrary data with SHA3-256.
pub fn hash(data: &[u8]) -> [u8; HASH_LEN] {
    Sha3_256::digest(data).into()
}

/// Hash arbitrary data with SHA3-256 and return lowercase hex.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}
