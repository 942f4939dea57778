//! Unlock protocol: turn a decoded container into an [`UnlockedVault`] and back.
//!
//! Two independent entry points lead to the same result:
//! - password unlock: the password hash decrypts the payload directly
//! - recovery unlock: the answers decrypt a backup copy of the password hash,
//!   which then decrypts the payload
//!
//! The write path mirrors both: the tree and the answers are encrypted under
//! the primary key, and the password hash is encrypted under the backup key.

use crate::api::ApiError;
use crate::codec::{self, DecodedVault};
use crate::crypto::{BackupCredentials, PasswordCredentials, VaultCipher, HASH_LEN, SALT};
use crate::model::{PasswordGroup, SecurityQuestion, UnlockedVault, Vault};
use crate::Result;
use tracing::debug;
use zeroize::Zeroizing;

/// Where a session is in the unlock lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnlockState {
    #[default]
    Locked,
    Unlocking,
    Unlocked,
    Failed(ApiError),
}

/// Decrypt a container with the primary credentials.
///
/// # Errors
/// - [`ApiError::InvalidPassword`] when the payload or answers do not decrypt
///   to well-formed content under the key
/// - [`ApiError::CorruptedVault`] when answers and questions do not line up
pub fn unlock_with_credentials(
    vault: &Vault,
    decoded: &DecodedVault,
    credentials: &PasswordCredentials,
) -> Result<UnlockedVault> {
    let cipher = VaultCipher::new(credentials.key()?, SALT)?;

    // A wrong key occasionally yields valid padding, so anything that does not
    // parse is treated the same as a failed decrypt.
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(&decoded.password_encrypted_data)
            .map_err(|_| ApiError::InvalidPassword)?,
    );
    let passwords: PasswordGroup =
        serde_json::from_slice(&plaintext).map_err(|_| ApiError::InvalidPassword)?;

    let answers: Vec<String> = match &decoded.password_encrypted_answers {
        None => Vec::new(),
        Some(encrypted) => {
            let plaintext = Zeroizing::new(
                cipher.decrypt(encrypted).map_err(|_| ApiError::InvalidPassword)?,
            );
            serde_json::from_slice(&plaintext).map_err(|_| ApiError::InvalidPassword)?
        }
    };

    if answers.len() != decoded.security_questions.len() {
        return Err(ApiError::CorruptedVault.into());
    }

    let security_questions = decoded
        .security_questions
        .iter()
        .zip(answers)
        .map(|(question, answer)| SecurityQuestion::new(question.clone(), answer))
        .collect();

    debug!(
        entries = passwords.total_size(),
        "Decrypted vault payload for {}", vault.username
    );

    Ok(UnlockedVault::new(
        vault,
        credentials,
        passwords,
        security_questions,
    ))
}

/// Recover the primary credentials from the backup copy of the password hash.
///
/// # Errors
/// - [`ApiError::VaultNotInitialized`] when the container has no backup material
/// - [`ApiError::InvalidPassword`] when the answers are wrong
pub fn recover_credentials(
    decoded: &DecodedVault,
    backup: &BackupCredentials,
) -> Result<PasswordCredentials> {
    let encrypted = decoded
        .backup_encrypted_password_hash
        .as_ref()
        .ok_or(ApiError::VaultNotInitialized)?;

    let cipher = VaultCipher::new(backup.key()?, SALT)?;
    let password_hash =
        Zeroizing::new(cipher.decrypt(encrypted).map_err(|_| ApiError::InvalidPassword)?);
    if password_hash.len() != HASH_LEN {
        return Err(ApiError::InvalidPassword.into());
    }

    Ok(PasswordCredentials::from_hash_bytes(&password_hash))
}

/// Password unlock: decode the container bytes and decrypt them.
pub fn unlock_with_password(
    vault: &Vault,
    data: &[u8],
    credentials: &PasswordCredentials,
) -> Result<UnlockedVault> {
    let decoded = codec::decode(data)?;
    unlock_with_credentials(vault, &decoded, credentials)
}

/// Recovery unlock: decode the container bytes and decrypt them via the answers.
pub fn unlock_with_answers(
    vault: &Vault,
    data: &[u8],
    backup: &BackupCredentials,
) -> Result<UnlockedVault> {
    let decoded = codec::decode(data)?;
    let credentials = recover_credentials(&decoded, backup)?;
    unlock_with_credentials(vault, &decoded, &credentials)
}

/// Encrypt and frame an unlocked vault for upload.
pub fn encrypt_vault(vault: &UnlockedVault) -> Result<DecodedVault> {
    let credentials = vault.credentials()?;
    let cipher = VaultCipher::new(credentials.key()?, SALT)?;

    let tree = Zeroizing::new(serde_json::to_vec(&vault.passwords)?);
    let password_encrypted_data = cipher.encrypt(&tree)?;

    let security_questions: Vec<String> = vault
        .security_questions
        .iter()
        .map(|q| q.question.clone())
        .collect();

    let (password_encrypted_answers, backup_encrypted_password_hash) =
        if security_questions.is_empty() {
            (None, None)
        } else {
            let answers = vault.answers();
            let backup = BackupCredentials::derive(&answers);

            let answers_json = Zeroizing::new(serde_json::to_vec(&answers)?);
            let encrypted_answers = cipher.encrypt(&answers_json)?;

            let password_hash = credentials.password_hash_bytes()?;
            let encrypted_hash = VaultCipher::new(backup.key()?, SALT)?.encrypt(&password_hash)?;

            (Some(encrypted_answers), Some(encrypted_hash))
        };

    Ok(DecodedVault {
        password_encrypted_data,
        security_questions,
        password_encrypted_answers,
        backup_encrypted_password_hash,
    })
}

/// Encrypt an unlocked vault and encode it into container bytes.
pub fn encode_vault(vault: &UnlockedVault) -> Result<Vec<u8>> {
    codec::encode(&encrypt_vault(vault)?)
}
