//! Wire types shared by the sync client and the vault server.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes carried in every error response.
///
/// - 1-999: general errors
/// - 1000-1999: server errors
/// - 2000-2999: client errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiError {
    #[error("Unknown error")]
    UnknownError,
    #[error("Server unreachable")]
    NetworkError,

    #[error("Internal server error")]
    InternalServerError,
    #[error("Vault is not initialized")]
    VaultNotInitialized,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Vault not found")]
    VaultNotFound,
    #[error("Revision parameter missing")]
    RevisionParameterMissing,
    #[error("Too many requests")]
    TooManyRequests,

    #[error("Corrupted vault")]
    CorruptedVault,
    #[error("Vault format too old")]
    VaultVersionTooOld,
    #[error("Vault format too new")]
    VaultVersionTooNew,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Recovery not possible, no security questions configured")]
    RecoveryNotPossible,
}

impl ApiError {
    /// Stable numeric code.
    pub fn code(self) -> u16 {
        match self {
            Self::UnknownError => 1,
            Self::NetworkError => 2,
            Self::InternalServerError => 1001,
            Self::VaultNotInitialized => 1002,
            Self::InvalidCredentials => 1003,
            Self::VaultNotFound => 1004,
            Self::RevisionParameterMissing => 1005,
            Self::TooManyRequests => 1006,
            Self::CorruptedVault => 2001,
            Self::VaultVersionTooOld => 2002,
            Self::VaultVersionTooNew => 2003,
            Self::InvalidPassword => 2004,
            Self::RecoveryNotPossible => 2005,
        }
    }

    /// HTTP status the server answers with for this code.
    pub fn http_status(self) -> u16 {
        match self {
            Self::UnknownError | Self::InternalServerError | Self::CorruptedVault => 500,
            Self::NetworkError => 503,
            Self::VaultNotInitialized => 412,
            Self::InvalidCredentials => 401,
            Self::VaultNotFound => 404,
            Self::TooManyRequests => 429,
            Self::RevisionParameterMissing
            | Self::VaultVersionTooOld
            | Self::VaultVersionTooNew
            | Self::InvalidPassword
            | Self::RecoveryNotPossible => 400,
        }
    }

    /// Best guess at a code for a non-success status without a parseable body.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::InvalidCredentials,
            404 => Self::VaultNotFound,
            412 => Self::VaultNotInitialized,
            429 => Self::TooManyRequests,
            503 => Self::NetworkError,
            _ => Self::UnknownError,
        }
    }
}

/// Error body: `{"error": "VAULT_NOT_FOUND"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiError,
}

impl From<ApiError> for ErrorResponse {
    fn from(error: ApiError) -> Self {
        Self { error }
    }
}

/// Body of `PATCH /v1/vault/security`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRequest {
    pub secret: String,
    pub security_questions: Vec<String>,
    pub backup_secret: Option<String>,
}

/// Body of `GET /v1/vault/security-questions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityQuestionsResponse {
    pub security_questions: Vec<String>,
}
