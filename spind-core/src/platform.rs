//! Platform-specific locations for client data

use std::path::PathBuf;

/// Environment variable overriding the client data directory.
pub const DATA_DIR_ENV: &str = "SPIND_DATA_DIR";

/// Get the platform-specific data directory for storing client data
///
/// Returns:
/// - `$SPIND_DATA_DIR` when set
/// - Windows: %LOCALAPPDATA%\spind
/// - macOS: ~/Library/Application Support/spind
/// - Linux/Other: ~/.local/share/spind
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("spind")
}

/// Directory holding cached vault blobs under a data root.
pub fn cache_dir(root: &std::path::Path) -> PathBuf {
    root.join("cache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir() {
        let dir = get_data_dir();
        if std::env::var_os(DATA_DIR_ENV).is_none() {
            assert!(dir.to_string_lossy().ends_with("spind"));
        }
    }

    #[test]
    fn test_cache_dir() {
        let root = PathBuf::from("/tmp/spind");
        assert_eq!(cache_dir(&root), PathBuf::from("/tmp/spind/cache"));
    }
}
