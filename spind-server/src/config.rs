//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub storage_path: PathBuf,
    pub max_payload_size: usize,
    /// Create unknown vault names on their first `PATCH /v1/vault/security`.
    pub open_registration: bool,
    /// Per-name budget for the recovery and security-question endpoints.
    pub recovery_rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            storage_path: PathBuf::from("spind.db"),
            max_payload_size: 16 * 1024 * 1024,
            open_registration: false,
            recovery_rate_limit_per_minute: 10,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.max_payload_size, 16 * 1024 * 1024);
        assert!(!config.open_registration);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spind.toml");
        std::fs::write(
            &path,
            "listen_addr = \"0.0.0.0:9000\"\nopen_registration = true\n",
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert!(config.open_registration);
        assert_eq!(config.storage_path, PathBuf::from("spind.db"));
        assert_eq!(config.recovery_rate_limit_per_minute, 10);
    }

    #[test]
    fn test_load_rejects_bad_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spind.toml");
        std::fs::write(&path, "max_payload_size = \"big\"\n").unwrap();
        assert!(ServerConfig::load(&path).is_err());
    }
}
