//! SQLite storage backend.

use crate::auth::verify_secret;
use crate::error::ServerError;
use crate::storage::{Result, SecurityUpdate, StoredBlob, VaultStorage};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use spind_core::{ApiError, SecurityRequest};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Thread-safe SQLite storage. Every call runs under the connection mutex.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> std::result::Result<Self, anyhow::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    pub fn in_memory() -> std::result::Result<Self, anyhow::Error> {
        let conn = Connection::open_in_memory()?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn initialize_schema(&self) -> std::result::Result<(), anyhow::Error> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("{}", e))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vaults (
                name TEXT PRIMARY KEY,
                data BLOB NOT NULL DEFAULT x'',
                revision INTEGER NOT NULL DEFAULT 0,
                secret TEXT,
                security_questions TEXT NOT NULL DEFAULT '[]',
                backup_secret TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ServerError::Internal(format!("Lock error: {}", e)))
    }

    fn optional_text(&self, name: &str, sql: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value: Option<Option<String>> = conn
            .query_row(sql, [name], |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }
}

fn to_sql_revision(revision: u64) -> Result<i64> {
    i64::try_from(revision).map_err(|_| ApiError::RevisionParameterMissing.into())
}

fn from_sql_revision(revision: i64) -> u64 {
    u64::try_from(revision).unwrap_or(0)
}

impl VaultStorage for SqliteStorage {
    fn exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM vaults WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn create(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO vaults (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![name, now],
        )?;
        Ok(inserted == 1)
    }

    fn read(&self, name: &str) -> Result<Option<StoredBlob>> {
        let conn = self.conn()?;
        let blob = conn
            .query_row(
                "SELECT data, revision FROM vaults WHERE name = ?1",
                [name],
                |row| {
                    Ok(StoredBlob {
                        data: row.get(0)?,
                        revision: from_sql_revision(row.get(1)?),
                    })
                },
            )
            .optional()?;
        Ok(blob)
    }

    fn write(&self, name: &str, data: &[u8], revision: u64) -> Result<()> {
        let revision = to_sql_revision(revision)?;
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE vaults SET data = ?2, revision = ?3, updated_at = ?4 WHERE name = ?1",
            params![name, data, revision, Utc::now().timestamp()],
        )?;
        if updated == 0 {
            return Err(ApiError::VaultNotFound.into());
        }
        Ok(())
    }

    fn secret(&self, name: &str) -> Result<Option<String>> {
        self.optional_text(name, "SELECT secret FROM vaults WHERE name = ?1")
    }

    fn security_questions(&self, name: &str) -> Result<Option<Vec<String>>> {
        let json = self.optional_text(name, "SELECT security_questions FROM vaults WHERE name = ?1")?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn backup_secret(&self, name: &str) -> Result<Option<String>> {
        self.optional_text(name, "SELECT backup_secret FROM vaults WHERE name = ?1")
    }

    fn revision(&self, name: &str) -> Result<u64> {
        let conn = self.conn()?;
        let revision: Option<i64> = conn
            .query_row("SELECT revision FROM vaults WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(revision.map_or(0, from_sql_revision))
    }

    fn write_security(
        &self,
        name: &str,
        secret: &str,
        security_questions: &[String],
        backup_secret: Option<&str>,
    ) -> Result<()> {
        let questions = serde_json::to_string(security_questions)?;
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE vaults
             SET secret = ?2, security_questions = ?3, backup_secret = ?4, updated_at = ?5
             WHERE name = ?1",
            params![name, secret, questions, backup_secret, Utc::now().timestamp()],
        )?;
        if updated == 0 {
            return Err(ApiError::VaultNotFound.into());
        }
        Ok(())
    }

    fn claim_or_update(
        &self,
        name: &str,
        presented: &str,
        create_missing: bool,
        request: &SecurityRequest,
    ) -> Result<SecurityUpdate> {
        let questions = serde_json::to_string(&request.security_questions)?;
        let now = Utc::now().timestamp();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current: Option<Option<String>> = tx
            .query_row("SELECT secret FROM vaults WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        let outcome = match current {
            None if !create_missing => return Ok(SecurityUpdate::NotFound),
            None => {
                tx.execute(
                    "INSERT INTO vaults (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
                    params![name, now],
                )?;
                SecurityUpdate::Created
            }
            Some(Some(secret)) if !verify_secret(&secret, presented) => {
                return Ok(SecurityUpdate::Rejected)
            }
            Some(_) => SecurityUpdate::Updated,
        };

        tx.execute(
            "UPDATE vaults
             SET secret = ?2, security_questions = ?3, backup_secret = ?4, updated_at = ?5
             WHERE name = ?1",
            params![name, request.secret, questions, request.backup_secret, now],
        )?;
        tx.commit()?;
        Ok(outcome)
    }
}
