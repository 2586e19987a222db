//! Per-profile key-value store
//!
//! Settings live in one flat namespace keyed `owner/name`. Reads fall back to
//! the caller's default when a key is absent or holds a different type; writes
//! are visible immediately and reach disk only on [`KeyValueStore::save`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, SettingValue, SettingsBackend};
use crate::config::write_atomically;
use crate::constants::profile::FILE_VERSION;
use crate::error::{Result, SettingsError};
use crate::reset::ResetToDefaults;

/// Build the flat key for an owner/name pair
pub fn setting_key(owner: &str, name: &str) -> String {
    format!("{owner}/{name}")
}

/// On-disk profile document
#[derive(Debug, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    profile: String,
    #[serde(default)]
    settings: BTreeMap<String, serde_json::Value>,
}

fn default_version() -> u32 {
    FILE_VERSION
}

#[derive(Debug)]
pub struct KeyValueStore {
    profile: String,
    path: PathBuf,
    values: BTreeMap<String, SettingValue>,
    dirty: bool,
}

impl KeyValueStore {
    /// Empty in-memory store that will persist to `path`
    pub fn new(path: PathBuf, profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            path,
            values: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the profile at `path`, or start empty when it was never saved
    pub fn open(path: PathBuf, profile: impl Into<String>) -> Result<Self> {
        let mut store = Self::new(path, profile);

        let contents = match fs::read_to_string(&store.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(profile = %store.profile, path = %store.path.display(), "No saved profile, starting with defaults");
                return Ok(store);
            }
            Err(e) => {
                return Err(SettingsError::persistence(
                    format!("Failed to read profile {}", store.path.display()),
                    e,
                ));
            }
        };

        let file: ProfileFile = serde_json::from_str(&contents).map_err(|e| {
            SettingsError::corrupt(
                format!("Failed to parse profile {}", store.path.display()),
                e,
            )
        })?;

        if !file.profile.is_empty() && file.profile != store.profile {
            warn!(expected = %store.profile, found = %file.profile, "Profile file names a different profile");
        }

        for (key, raw) in file.settings {
            match SettingValue::from_json(&raw) {
                Some(value) => {
                    store.values.insert(key, value);
                }
                None => warn!(key = %key, value = %raw, "Skipping unsupported setting value"),
            }
        }

        info!(profile = %store.profile, count = store.values.len(), version = file.version, "Loaded profile");
        Ok(store)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when there are writes not yet saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get_bool(&self, owner: &str, name: &str, default: bool) -> bool {
        self.value(owner, name)
            .and_then(SettingValue::as_bool)
            .unwrap_or(default)
    }

    pub fn set_bool(&mut self, owner: &str, name: &str, value: bool) {
        self.insert(owner, name, SettingValue::Bool(value));
    }

    pub fn get_int(&self, owner: &str, name: &str, default: i64) -> i64 {
        self.value(owner, name)
            .and_then(SettingValue::as_int)
            .unwrap_or(default)
    }

    pub fn set_int(&mut self, owner: &str, name: &str, value: i64) {
        self.insert(owner, name, SettingValue::Int(value));
    }

    pub fn get_string(&self, owner: &str, name: &str, default: &str) -> String {
        self.value(owner, name)
            .and_then(SettingValue::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn set_string(&mut self, owner: &str, name: &str, value: &str) {
        self.insert(owner, name, SettingValue::String(value.to_string()));
    }

    pub fn value(&self, owner: &str, name: &str) -> Option<&SettingValue> {
        self.values.get(&setting_key(owner, name))
    }

    pub fn contains(&self, owner: &str, name: &str) -> bool {
        self.values.contains_key(&setting_key(owner, name))
    }

    /// Remove a setting so that reads return the default again
    pub fn remove(&mut self, owner: &str, name: &str) -> Option<SettingValue> {
        let removed = self.values.remove(&setting_key(owner, name));
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Drop every setting in the profile
    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.dirty = true;
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Commit the in-memory state to disk
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::persistence(
                    format!("Failed to create profile directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let file = ProfileFile {
            version: FILE_VERSION,
            profile: self.profile.clone(),
            settings: self
                .values
                .iter()
                .map(|(key, value)| serde_json::to_value(value).map(|json| (key.clone(), json)))
                .collect::<serde_json::Result<_>>()
                .map_err(|e| {
                    SettingsError::corrupt(format!("Failed to encode profile '{}'", self.profile), e)
                })?,
        };

        let json = serde_json::to_vec_pretty(&file).map_err(|e| {
            SettingsError::corrupt(format!("Failed to serialize profile '{}'", self.profile), e)
        })?;

        write_atomically(&self.path, &json).map_err(|e| {
            SettingsError::persistence(
                format!("Failed to write profile {}", self.path.display()),
                e,
            )
        })?;

        self.dirty = false;
        info!(profile = %self.profile, path = %self.path.display(), count = self.values.len(), "Saved profile");
        Ok(())
    }

    fn insert(&mut self, owner: &str, name: &str, value: SettingValue) {
        let key = setting_key(owner, name);
        debug!(key = %key, value = %value, "Setting updated");
        if self.values.get(&key) != Some(&value) {
            self.values.insert(key, value);
            self.dirty = true;
        }
    }
}

impl SettingsBackend for KeyValueStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Profile
    }

    fn read(&self, scope: &str, name: &str) -> Option<SettingValue> {
        self.value(scope, name).cloned()
    }

    fn write(&mut self, scope: &str, name: &str, value: SettingValue) -> Result<()> {
        self.insert(scope, name, value);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.save()
    }
}

impl ResetToDefaults for KeyValueStore {
    fn reset_to_defaults(&mut self) -> Result<()> {
        info!(profile = %self.profile, count = self.values.len(), "Resetting profile settings to defaults");
        self.clear();
        self.save()
    }
}
