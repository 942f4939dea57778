//! The in-memory unlocked vault.

use crate::crypto::{PasswordCredentials, Result as CryptoResult};
use crate::model::{PasswordGroup, SecurityQuestion, Vault};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// A decrypted vault, alive only for the duration of a session.
///
/// Holds the password hash (encryption key source) and the secret
/// (server credential). Everything sensitive is wiped on drop.
#[derive(Clone)]
pub struct UnlockedVault {
    pub address: String,
    pub username: String,
    password_hash: Zeroizing<String>,
    secret: Zeroizing<String>,
    pub passwords: PasswordGroup,
    pub security_questions: Vec<SecurityQuestion>,
}

impl UnlockedVault {
    pub fn new(
        vault: &Vault,
        credentials: &PasswordCredentials,
        passwords: PasswordGroup,
        security_questions: Vec<SecurityQuestion>,
    ) -> Self {
        Self {
            address: vault.address.clone(),
            username: vault.username.clone(),
            password_hash: Zeroizing::new(credentials.password_hash().to_string()),
            secret: Zeroizing::new(credentials.secret().to_string()),
            passwords,
            security_questions,
        }
    }

    /// A freshly set up vault with an empty root group.
    pub fn new_empty(
        vault: &Vault,
        credentials: &PasswordCredentials,
        security_questions: Vec<SecurityQuestion>,
    ) -> Self {
        Self::new(vault, credentials, PasswordGroup::default(), security_questions)
    }

    /// Hex-encoded password hash.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Hex-encoded server secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Credentials rebuilt from the stored password hash.
    pub fn credentials(&self) -> CryptoResult<PasswordCredentials> {
        PasswordCredentials::from_hash_hex(&self.password_hash)
    }

    /// Copy of this vault under new credentials.
    pub fn with_credentials(&self, credentials: &PasswordCredentials) -> Self {
        let mut vault = self.clone();
        vault.password_hash = Zeroizing::new(credentials.password_hash().to_string());
        vault.secret = Zeroizing::new(credentials.secret().to_string());
        vault
    }

    /// Pointer to this vault on its server.
    pub fn to_vault(&self, name: impl Into<String>) -> Vault {
        Vault::new(name, self.address.clone(), self.username.clone())
    }

    pub fn same_address_and_username(&self, other: &Vault) -> bool {
        self.address == other.address && self.username == other.username
    }

    /// Answers in question order.
    pub fn answers(&self) -> Vec<&str> {
        self.security_questions
            .iter()
            .map(|q| q.answer.as_str())
            .collect()
    }
}

impl fmt::Debug for UnlockedVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedVault")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("passwords", &self.passwords.total_size())
            .field("security_questions", &self.security_questions.len())
            .finish_non_exhaustive()
    }
}

impl Drop for UnlockedVault {
    fn drop(&mut self) {
        self.passwords.wipe();
        for question in &mut self.security_questions {
            question.answer.zeroize();
        }
    }
}
