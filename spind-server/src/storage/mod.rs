//! Vault storage: one record per vault name.
//!
//! A record holds the opaque container, its revision, the primary secret,
//! the question texts and the backup secret. The server never sees
//! plaintext or encryption keys.

pub mod models;
mod sqlite;

pub use models::StoredBlob;
pub use sqlite::SqliteStorage;

use crate::error::ServerError;
use spind_core::SecurityRequest;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Outcome of [`VaultStorage::claim_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityUpdate {
    /// The record did not exist and was registered with these settings.
    Created,
    Updated,
    NotFound,
    /// A secret is set and the presented one does not match it.
    Rejected,
}

/// Account and blob storage keyed by vault name.
pub trait VaultStorage: Send + Sync {
    fn exists(&self, name: &str) -> Result<bool>;

    /// Create an empty record (revision 0, no secret). Returns `false` if it existed.
    fn create(&self, name: &str) -> Result<bool>;

    /// Blob and revision from the same write. `None` for an unknown name.
    fn read(&self, name: &str) -> Result<Option<StoredBlob>>;

    /// Replace blob and revision in one step.
    fn write(&self, name: &str, data: &[u8], revision: u64) -> Result<()>;

    fn secret(&self, name: &str) -> Result<Option<String>>;

    /// Question texts. `None` for an unknown name.
    fn security_questions(&self, name: &str) -> Result<Option<Vec<String>>>;

    fn backup_secret(&self, name: &str) -> Result<Option<String>>;

    /// Current revision, 0 for unknown names or never-written vaults.
    fn revision(&self, name: &str) -> Result<u64>;

    /// Replace secret, questions and backup secret in one step.
    fn write_security(
        &self,
        name: &str,
        secret: &str,
        security_questions: &[String],
        backup_secret: Option<&str>,
    ) -> Result<()>;

    /// Install `request` if `presented` matches the current secret, or if no
    /// secret is set yet. Check and write happen as one step, so of several
    /// concurrent claims on an unclaimed vault exactly one wins.
    ///
    /// With `create_missing` an unknown name is registered first.
    fn claim_or_update(
        &self,
        name: &str,
        presented: &str,
        create_missing: bool,
        request: &SecurityRequest,
    ) -> Result<SecurityUpdate>;
}
