//! Credential derivation for the primary password and the security-question backup.
//!
//! Primary path:
//! - `password_hash = sha3(password)`, hex-encoded, never leaves the client
//! - `secret = sha3(password_hash)`, hex-encoded, sent as the Basic-auth password
//!
//! Backup path:
//! - `backup_password_hash = sha3(answers.join(";"))`
//! - `backup_secret = sha3(backup_password_hash)`, used only on the recovery endpoint
//!
//! Knowing a secret does not reveal the hash it was derived from, so the
//! server can authenticate clients without being able to decrypt vaults.

use crate::crypto::{cipher::key_from_hash, hash, CryptoError, Result, HASH_LEN};
use zeroize::Zeroizing;

/// Separator used to join security-question answers into one backup password.
pub const ANSWER_SEPARATOR: &str = ";";

/// Password hash and server secret derived from a master password.
#[derive(Clone)]
pub struct PasswordCredentials {
    password_hash: Zeroizing<String>,
    secret: Zeroizing<String>,
}

impl PasswordCredentials {
    /// Derive credentials from a master password.
    pub fn derive(password: &str) -> Self {
        let password_hash = Zeroizing::new(hash(password.as_bytes()));
        Self::from_hash_bytes(password_hash.as_slice())
    }

    /// Build credentials from the raw password hash bytes.
    ///
    /// Used by the recovery path, which decrypts the raw hash from the
    /// backup blob.
    pub fn from_hash_bytes(password_hash: &[u8]) -> Self {
        Self {
            password_hash: Zeroizing::new(hex::encode(password_hash)),
            secret: Zeroizing::new(hex::encode(hash(password_hash))),
        }
    }

    /// Build credentials from a hex-encoded password hash.
    pub fn from_hash_hex(password_hash: &str) -> Result<Self> {
        let raw = Zeroizing::new(
            hex::decode(password_hash).map_err(|e| CryptoError::InvalidHash(e.to_string()))?,
        );
        if raw.len() != HASH_LEN {
            return Err(CryptoError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH_LEN,
                raw.len()
            )));
        }
        Ok(Self::from_hash_bytes(&raw))
    }

    /// Hex-encoded password hash (encryption key source).
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Hex-encoded secret (authentication token).
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Encryption key for the primary payload.
    pub fn key(&self) -> Result<&str> {
        key_from_hash(&self.password_hash)
    }

    /// Raw bytes of the password hash.
    pub fn password_hash_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        hex::decode(self.password_hash.as_str())
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::InvalidHash(e.to_string()))
    }
}

/// Backup hash and backup secret derived from security-question answers.
#[derive(Clone)]
pub struct BackupCredentials {
    backup_password_hash: Zeroizing<String>,
    backup_secret: Zeroizing<String>,
}

impl BackupCredentials {
    /// Derive backup credentials from answers, in question order.
    pub fn derive<S: AsRef<str>>(answers: &[S]) -> Self {
        let joined = Zeroizing::new(
            answers
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(ANSWER_SEPARATOR),
        );
        let backup_password_hash = Zeroizing::new(hash(joined.as_bytes()));

        Self {
            backup_password_hash: Zeroizing::new(hex::encode(backup_password_hash.as_slice())),
            backup_secret: Zeroizing::new(hex::encode(hash(backup_password_hash.as_slice()))),
        }
    }

    /// Hex-encoded backup password hash.
    pub fn backup_password_hash(&self) -> &str {
        &self.backup_password_hash
    }

    /// Hex-encoded backup secret, the recovery endpoint credential.
    pub fn secret(&self) -> &str {
        &self.backup_secret
    }

    /// Encryption key for the backup copy of the password hash.
    ///
    /// Comes straight from the backup hash; the secret is one hash further.
    pub fn key(&self) -> Result<&str> {
        key_from_hash(&self.backup_password_hash)
    }
}
