//! Vault domain model: the password tree, security questions and vault pointers.

mod group;
mod vault;

pub use group::PasswordGroup;
pub use vault::UnlockedVault;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zeroize::Zeroize;

/// Field key holding the secret value of a password entry.
pub const PASSWORD_FIELD: &str = "password";

/// A single credential: a name and free-form fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Password {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The reserved `password` field, if set.
    pub fn password(&self) -> Option<&str> {
        self.fields.get(PASSWORD_FIELD).map(String::as_str)
    }

    pub(crate) fn wipe(&mut self) {
        for value in self.fields.values_mut() {
            value.zeroize();
        }
    }
}

/// A security question with its answer (answer only known while unlocked)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityQuestion {
    pub question: String,
    pub answer: String,
}

impl SecurityQuestion {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A bookmark to a vault on a server. Not secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vault {
    pub name: String,
    pub address: String,
    pub username: String,
}

impl Vault {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            username: username.into(),
        }
    }

    /// Whether both pointers refer to the same server account.
    pub fn same_address_and_username(&self, other: &Vault) -> bool {
        self.address == other.address && self.username == other.username
    }
}
