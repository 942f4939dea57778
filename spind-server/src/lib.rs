//! Spind Vault Server
//!
//! Stores one opaque encrypted container per vault name together with its
//! revision, the client-derived secret, the security question texts and the
//! backup secret. The server never holds encryption keys or plaintext.

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod server;
pub mod storage;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{build_router, AppState};
pub use storage::{SecurityUpdate, SqliteStorage, StoredBlob, VaultStorage};
