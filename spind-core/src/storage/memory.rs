//! In-memory storage for tests and ephemeral sessions.

use crate::model::Vault;
use crate::storage::{cache_key, ClientStorage};
use crate::{Result, SpindError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    vaults: Vec<Vault>,
    cache: HashMap<String, (Vec<u8>, u64)>,
    pending: HashMap<String, Vec<u8>>,
}

/// Storage that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| SpindError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl ClientStorage for MemoryStorage {
    fn vaults(&self) -> Result<Vec<Vault>> {
        Ok(self.lock()?.vaults.clone())
    }

    fn set_vaults(&self, vaults: &[Vault]) -> Result<()> {
        self.lock()?.vaults = vaults.to_vec();
        Ok(())
    }

    fn cached_vault(&self, vault: &Vault) -> Result<Option<Vec<u8>>> {
        Ok(self
            .lock()?
            .cache
            .get(&cache_key(vault))
            .map(|(data, _)| data.clone()))
    }

    fn cached_revision(&self, vault: &Vault) -> Result<Option<u64>> {
        Ok(self
            .lock()?
            .cache
            .get(&cache_key(vault))
            .map(|(_, revision)| *revision))
    }

    fn cache_vault(&self, vault: &Vault, data: &[u8], revision: u64) -> Result<()> {
        self.lock()?
            .cache
            .insert(cache_key(vault), (data.to_vec(), revision));
        Ok(())
    }

    fn pending_rotation(&self, vault: &Vault) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.pending.get(&cache_key(vault)).cloned())
    }

    fn set_pending_rotation(&self, vault: &Vault, data: Option<&[u8]>) -> Result<()> {
        let mut inner = self.lock()?;
        match data {
            Some(data) => inner.pending.insert(cache_key(vault), data.to_vec()),
            None => inner.pending.remove(&cache_key(vault)),
        };
        Ok(())
    }
}
