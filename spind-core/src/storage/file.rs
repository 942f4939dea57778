//! File-backed storage under a data directory.
//!
//! ```text
//! <root>/vaults.json
//! <root>/cache/<key>.vault-data
//! <root>/cache/<key>.vault-rev
//! <root>/cache/<key>.vault-pending   (only while a rotation is unfinished)
//! ```
//!
//! `<key>` is the hex SHA3-256 of the vault's address and username.

use crate::model::Vault;
use crate::platform;
use crate::storage::{cache_key, ClientStorage};
use crate::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const VAULTS_FILE: &str = "vaults.json";
const DATA_EXT: &str = "vault-data";
const REVISION_EXT: &str = "vault-rev";
const PENDING_EXT: &str = "vault-pending";

/// Storage rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_file(&self, vault: &Vault, ext: &str) -> PathBuf {
        platform::cache_dir(&self.root).join(format!("{}.{}", cache_key(vault), ext))
    }
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl ClientStorage for FileStorage {
    fn vaults(&self) -> Result<Vec<Vault>> {
        match read_optional(&self.root.join(VAULTS_FILE))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn set_vaults(&self, vaults: &[Vault]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.root.join(VAULTS_FILE), serde_json::to_vec_pretty(vaults)?)?;
        Ok(())
    }

    fn cached_vault(&self, vault: &Vault) -> Result<Option<Vec<u8>>> {
        read_optional(&self.cache_file(vault, DATA_EXT))
    }

    fn cached_revision(&self, vault: &Vault) -> Result<Option<u64>> {
        let Some(bytes) = read_optional(&self.cache_file(vault, REVISION_EXT))? else {
            return Ok(None);
        };
        let revision = String::from_utf8_lossy(&bytes).trim().parse().ok();
        if revision.is_none() {
            warn!("Ignoring unreadable cached revision for {}", vault.username);
        }
        Ok(revision)
    }

    fn cache_vault(&self, vault: &Vault, data: &[u8], revision: u64) -> Result<()> {
        fs::create_dir_all(platform::cache_dir(&self.root))?;
        // Data first: a stale revision next to newer data only costs a full download.
        fs::write(self.cache_file(vault, DATA_EXT), data)?;
        fs::write(self.cache_file(vault, REVISION_EXT), revision.to_string())?;
        debug!(revision, "Cached vault for {}", vault.username);
        Ok(())
    }

    fn pending_rotation(&self, vault: &Vault) -> Result<Option<Vec<u8>>> {
        read_optional(&self.cache_file(vault, PENDING_EXT))
    }

    fn set_pending_rotation(&self, vault: &Vault, data: Option<&[u8]>) -> Result<()> {
        let path = self.cache_file(vault, PENDING_EXT);
        match data {
            Some(data) => {
                fs::create_dir_all(platform::cache_dir(&self.root))?;
                fs::write(path, data)?;
                debug!("Saved pending rotation for {}", vault.username);
            }
            None => match fs::remove_file(path) {
                Ok(()) => debug!("Cleared pending rotation for {}", vault.username),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}
