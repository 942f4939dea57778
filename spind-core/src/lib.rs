//! Spind Core Library
//!
//! This library implements the vault protocol shared by the spind client and
//! server: SHA3/AES credential derivation, the binary vault container, the
//! password and security-question unlock paths, and (behind the `sync`
//! feature) the revision-based HTTP sync client.

pub mod api;
pub mod codec;
pub mod crypto;
pub mod model;
pub mod platform;
pub mod storage;
#[cfg(feature = "sync")]
pub mod sync;
pub mod unlock;

pub use api::{ApiError, ErrorResponse, SecurityQuestionsResponse, SecurityRequest};
pub use codec::{decode, encode, DecodedVault, FORMAT_VERSION};
pub use crypto::{BackupCredentials, CryptoError, PasswordCredentials};
pub use model::{Password, PasswordGroup, SecurityQuestion, UnlockedVault, Vault};
pub use platform::get_data_dir;
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
pub use unlock::{encode_vault, unlock_with_answers, unlock_with_password, UnlockState};

use thiserror::Error;

/// Result type for spind operations
pub type Result<T> = std::result::Result<T, SpindError>;

/// General error type for spind operations
#[derive(Error, Debug)]
pub enum SpindError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Index {index} out of bounds for {len} entries")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Vault is locked")]
    VaultLocked,

    /// The server accepted new credentials but the re-encrypted vault was
    /// not uploaded. `vault` holds the rotated vault for a retry.
    #[error("Credentials rotated but upload failed: {source}")]
    PartialRotation {
        vault: Box<UnlockedVault>,
        source: ApiError,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpindError {
    /// The wire code that best describes this error.
    pub fn api_error(&self) -> ApiError {
        match self {
            Self::Api(e) => *e,
            Self::PartialRotation { source, .. } => *source,
            Self::Crypto(_) => ApiError::InvalidPassword,
            Self::Serialization(_) => ApiError::CorruptedVault,
            Self::IndexOutOfBounds { .. }
            | Self::VaultLocked
            | Self::Storage(_)
            | Self::Io(_) => ApiError::UnknownError,
        }
    }
}
