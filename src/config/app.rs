//! Application config for the command-line tool
//!
//! Tells the binary where profile data and logs live, which profile is active
//! and how verbose logging should be. Settings themselves are not stored here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::{paths, profile};

fn default_profile_name() -> String {
    profile::DEFAULT_PROFILE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of profile and legacy data; platform data dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Directory the core writes logs to; `<data_dir>/logs` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Log directory used before profiles existed; `<data_dir>/CoreLogs` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_log_dir: Option<PathBuf>,

    /// Log file the running core writes to; never deleted by a purge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_log_file: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            profile: default_profile_name(),
            log_dir: None,
            legacy_log_dir: None,
            current_log_file: None,
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::CONFIG_FILENAME);
        path
    }

    /// Load configuration from the default location or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// Load configuration from TOML file or create default
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(path = %config_path.display(), "Config file not found, creating default config");
            let config = AppConfig::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from {}", config_path.display()))?;

        info!(path = %config_path.display(), profile = %config.profile, "Loaded config");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, toml_string)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!(path = %config_path.display(), "Saved config");
        Ok(())
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(paths::APP_DIR);
            path
        })
    }

    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.resolved_data_dir().join(paths::LOG_DIR))
    }

    pub fn resolved_legacy_log_dir(&self) -> PathBuf {
        self.legacy_log_dir
            .clone()
            .unwrap_or_else(|| self.resolved_data_dir().join(paths::LEGACY_LOG_DIR))
    }

    /// Both log directories, current first
    pub fn log_dirs(&self) -> Vec<PathBuf> {
        vec![self.resolved_log_dir(), self.resolved_legacy_log_dir()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig::load_from(&path).unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_dir = \"/srv/scope\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();

        assert_eq!(config.profile, "default");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.resolved_log_dir(), PathBuf::from("/srv/scope/logs"));
        assert_eq!(
            config.resolved_legacy_log_dir(),
            PathBuf::from("/srv/scope/CoreLogs")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = AppConfig {
            data_dir: Some(dir.path().to_path_buf()),
            profile: "lab".to_string(),
            log_dir: Some(dir.path().join("logs")),
            legacy_log_dir: Some(dir.path().join("logs")),
            current_log_file: Some(dir.path().join("logs").join("CoreLog0001.txt")),
            log_level: "debug".to_string(),
        };

        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "profile = [").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));
    }
}
