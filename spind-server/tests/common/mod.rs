#![allow(dead_code)]

//! Shared helpers: run the router on an ephemeral port.

use spind_server::storage::Result;
use spind_core::SecurityRequest;
use spind_server::{
    build_router, AppState, SecurityUpdate, ServerConfig, ServerError, SqliteStorage, StoredBlob,
    VaultStorage,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Serve `storage` on 127.0.0.1 and return the base URL.
pub async fn spawn_server(storage: Arc<dyn VaultStorage>, config: ServerConfig) -> String {
    let app = build_router(AppState::new(storage, config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", address)
}

/// In-memory server with `names` provisioned.
pub async fn spawn_with(names: &[&str]) -> (String, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    for name in names {
        storage.create(name).unwrap();
    }
    let url = spawn_server(storage.clone(), ServerConfig::default()).await;
    (url, storage)
}

/// SQLite storage whose blob writes can be switched off.
pub struct FlakyStorage {
    inner: SqliteStorage,
    pub fail_writes: AtomicBool,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self {
            inner: SqliteStorage::in_memory().unwrap(),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

impl VaultStorage for FlakyStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        self.inner.exists(name)
    }

    fn create(&self, name: &str) -> Result<bool> {
        self.inner.create(name)
    }

    fn read(&self, name: &str) -> Result<Option<StoredBlob>> {
        self.inner.read(name)
    }

    fn write(&self, name: &str, data: &[u8], revision: u64) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServerError::Database("disk full".to_string()));
        }
        self.inner.write(name, data, revision)
    }

    fn secret(&self, name: &str) -> Result<Option<String>> {
        self.inner.secret(name)
    }

    fn security_questions(&self, name: &str) -> Result<Option<Vec<String>>> {
        self.inner.security_questions(name)
    }

    fn backup_secret(&self, name: &str) -> Result<Option<String>> {
        self.inner.backup_secret(name)
    }

    fn revision(&self, name: &str) -> Result<u64> {
        self.inner.revision(name)
    }

    fn write_security(
        &self,
        name: &str,
        secret: &str,
        security_questions: &[String],
        backup_secret: Option<&str>,
    ) -> Result<()> {
        self.inner
            .write_security(name, secret, security_questions, backup_secret)
    }

    fn claim_or_update(
        &self,
        name: &str,
        presented: &str,
        create_missing: bool,
        request: &SecurityRequest,
    ) -> Result<SecurityUpdate> {
        self.inner
            .claim_or_update(name, presented, create_missing, request)
    }
}
