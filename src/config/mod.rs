//! Configuration and settings persistence
//!
//! This module provides three layers:
//! - **store**: per-profile key-value settings (current generation, JSON)
//! - **legacy**: the older nested preference tree (TOML)
//! - **profile**: ProfileManager tying the active profile to both generations
//!
//! plus **app**, the command-line tool's own config file.

pub mod app;
pub mod legacy;
pub mod profile;
pub mod store;

// Re-export commonly used types
pub use app::AppConfig;
pub use legacy::{LegacyNode, LegacyPreferenceTree, MemoryMedium, PreferenceMedium, TomlFileMedium};
pub use profile::{ProfileManager, SharedProfileManager};
pub use store::KeyValueStore;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Replace `path` with `bytes` without exposing a half-written file
///
/// Writes a sibling temp file, syncs it, then renames it over the target.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomically_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"old").unwrap();

        write_atomically(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_write_atomically_missing_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("settings.json");
        assert!(write_atomically(&path, b"x").is_err());
        assert!(!path.exists());
    }
}
