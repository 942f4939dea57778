//! Client-side persistence: the vault pointer list and the encrypted blob cache.
//!
//! The cache is keyed by (address, username). It only ever holds encrypted
//! container bytes, never plaintext or credentials. Next to each cached
//! container there may be a pending rotation: the container re-encrypted
//! under new credentials that the server has accepted but whose upload did
//! not complete.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::crypto::hash_hex;
use crate::model::Vault;
use crate::Result;

/// Platform key-value storage used by the sync client.
///
/// Methods take `&self`; implementations handle their own synchronization.
pub trait ClientStorage: Send + Sync {
    /// Saved vault pointers, in display order.
    fn vaults(&self) -> Result<Vec<Vault>>;

    /// Replace the saved vault pointers.
    fn set_vaults(&self, vaults: &[Vault]) -> Result<()>;

    /// Cached container bytes for a vault, if any.
    fn cached_vault(&self, vault: &Vault) -> Result<Option<Vec<u8>>>;

    /// Revision of the cached container, if any.
    fn cached_revision(&self, vault: &Vault) -> Result<Option<u64>>;

    /// Store container bytes together with their revision.
    fn cache_vault(&self, vault: &Vault, data: &[u8], revision: u64) -> Result<()>;

    /// Container re-encrypted for a credential rotation whose upload has not
    /// been confirmed by the server.
    fn pending_rotation(&self, vault: &Vault) -> Result<Option<Vec<u8>>>;

    /// Save the pending rotation container, or clear it with `None`.
    fn set_pending_rotation(&self, vault: &Vault, data: Option<&[u8]>) -> Result<()>;
}

/// Cache key for a vault: hex SHA3-256 of `address`, a NUL byte, then `username`.
///
/// Distinct accounts never share a key, and the key is always a safe file name.
pub(crate) fn cache_key(vault: &Vault) -> String {
    let mut material = Vec::with_capacity(vault.address.len() + 1 + vault.username.len());
    material.extend_from_slice(vault.address.as_bytes());
    material.push(0);
    material.extend_from_slice(vault.username.as_bytes());
    hash_hex(&material)
}
