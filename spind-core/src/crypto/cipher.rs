//! AES-256-CBC encryption and decryption for vault blobs.
//!
//! Uses AES-256-CBC with:
//! - a 32-character key string, taken from the first 32 characters of a
//!   hex-encoded hash
//! - the AES key derived from that string with PBKDF2-HMAC-SHA256, using the
//!   salt as PBKDF2 salt and [`PBKDF2_ITERATIONS`] rounds
//! - 128-bit IV taken from the same fixed 16-character salt
//! - PKCS#7 padding
//!
//! The salt never changes between vaults. It is kept as-is so that existing
//! vaults keep decrypting.

use crate::crypto::{CryptoError, Result};
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::Sha256;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Key length in bytes (and characters, keys are ASCII hex).
pub const KEY_LEN: usize = 32;

/// IV length in bytes.
pub const SALT_LEN: usize = 16;

/// The salt used as IV and PBKDF2 salt for every vault blob.
pub const SALT: &str = "saltsaltsaltsalt";

/// PBKDF2 rounds turning a key string into an AES key.
pub const PBKDF2_ITERATIONS: u32 = 65_536;

/// Take the encryption key out of a hex-encoded hash.
pub fn key_from_hash(hash_hex: &str) -> Result<&str> {
    hash_hex
        .get(..KEY_LEN)
        .ok_or(CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: hash_hex.len(),
        })
}

fn check_lengths(key: &str, salt: &str) -> Result<()> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: key.len(),
        });
    }
    if salt.len() != SALT_LEN {
        return Err(CryptoError::InvalidSaltLength {
            expected: SALT_LEN,
            got: salt.len(),
        });
    }
    Ok(())
}

/// AES-256-CBC with a key already stretched through PBKDF2.
///
/// Derivation is the expensive part, so callers that encrypt or decrypt
/// several blobs under one key build a `VaultCipher` once and reuse it.
pub struct VaultCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
    iv: [u8; SALT_LEN],
}

impl VaultCipher {
    /// Derive the AES key from a 32-character key string and a 16-character salt.
    pub fn new(key: &str, salt: &str) -> Result<Self> {
        check_lengths(key, salt)?;

        let mut derived = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            key.as_bytes(),
            salt.as_bytes(),
            PBKDF2_ITERATIONS,
            &mut derived[..],
        );

        let mut iv = [0u8; SALT_LEN];
        iv.copy_from_slice(salt.as_bytes());

        Ok(Self { key: derived, iv })
    }

    /// Encrypt data. The plaintext may be empty.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256CbcEnc::new_from_slices(&self.key[..], &self.iv)
            .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(data))
    }

    /// Decrypt data.
    ///
    /// A wrong key almost always shows up as a padding error here. Callers
    /// must still validate the plaintext, since a wrong key can produce valid
    /// padding by chance.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256CbcDec::new_from_slices(&self.key[..], &self.iv)
            .map_err(|e| CryptoError::DecryptionFailed(format!("{}", e)))?;

        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(|_| CryptoError::DecryptionFailed("Invalid padding".to_string()))
    }
}

/// Encrypt data using AES-256-CBC
///
/// # Arguments
/// * `data` - The plaintext, may be empty
/// * `key` - 32-character key string
/// * `salt` - 16-character salt string
pub fn encrypt(data: &[u8], key: &str, salt: &str) -> Result<Vec<u8>> {
    VaultCipher::new(key, salt)?.encrypt(data)
}

/// Decrypt data using AES-256-CBC
pub fn decrypt(data: &[u8], key: &str, salt: &str) -> Result<Vec<u8>> {
    VaultCipher::new(key, salt)?.decrypt(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "passwordpasswordpasswordpassword";

    #[test]
    fn test_encrypt_known_answer() {
        let encrypted = encrypt(b"example text", KEY, SALT).unwrap();
        assert_eq!(hex::encode(encrypted), "b7842b662a28c49e80a12a0ca4662b88");
    }

    #[test]
    fn test_decrypt_known_answer() {
        let data = hex::decode("b7842b662a28c49e80a12a0ca4662b88").unwrap();
        let decrypted = decrypt(&data, KEY, SALT).unwrap();
        assert_eq!(decrypted, b"example text");
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"Hello, World! This is a test spanning several blocks.";
        let encrypted = encrypt(plaintext, KEY, SALT).unwrap();
        assert_eq!(encrypted.len() % 16, 0);
        assert_eq!(decrypt(&encrypted, KEY, SALT).unwrap(), plaintext);
    }

    #[test]
    fn test_empty_plaintext_is_one_block() {
        let encrypted = encrypt(b"", KEY, SALT).unwrap();
        assert_eq!(encrypted.len(), 16);
        assert!(decrypt(&encrypted, KEY, SALT).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt(b"Secret data", KEY, SALT).unwrap();
        let result = decrypt(&encrypted, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", SALT);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let encrypted = encrypt(b"Secret data", KEY, SALT).unwrap();
        assert!(decrypt(&encrypted[..10], KEY, SALT).is_err());
        assert!(decrypt(&[], KEY, SALT).is_err());
    }

    #[test]
    fn test_invalid_lengths() {
        assert!(matches!(
            encrypt(b"x", "short", SALT),
            Err(CryptoError::InvalidKeyLength { expected: 32, got: 5 })
        ));
        assert!(matches!(
            encrypt(b"x", KEY, "salt"),
            Err(CryptoError::InvalidSaltLength { expected: 16, got: 4 })
        ));
    }

    #[test]
    fn test_cipher_reuse_matches_one_shot() {
        let cipher = VaultCipher::new(KEY, SALT).unwrap();
        let encrypted = cipher.encrypt(b"example text").unwrap();
        assert_eq!(encrypted, encrypt(b"example text", KEY, SALT).unwrap());
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), b"example text");
    }

    #[test]
    fn test_key_from_hash() {
        let hash = "716153e0441ce21dbbf2526449a5cbaa0c74ba423a6362ce79022891354d19de";
        assert_eq!(key_from_hash(hash).unwrap(), "716153e0441ce21dbbf2526449a5cbaa");
        assert!(key_from_hash("abcd").is_err());
    }
}
