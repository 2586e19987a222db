//! Active profile management
//!
//! A [`ProfileManager`] owns the key-value store of the one active profile and
//! a handle on the legacy preference tree. New writes always land in the
//! profile store; legacy values are reachable only through the legacy tree.
//! Nothing is copied or merged between the two automatically.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, SettingsBackend};
use crate::config::app::AppConfig;
use crate::config::legacy::{LegacyPreferenceTree, TomlFileMedium};
use crate::config::store::KeyValueStore;
use crate::constants::{paths, profile};
use crate::error::{Result, SettingsError};
use crate::reset::{ResetReport, SettingsResetController};

/// Reject names that could escape the profiles directory or not round-trip
/// through a file name
pub fn validate_profile_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "profile name cannot be empty"
    } else if name.contains('/') || name.contains('\\') {
        "profile name cannot contain path separators"
    } else if name.contains("..") {
        "profile name cannot contain '..'"
    } else if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ')
    {
        "profile name can only contain letters, numbers, spaces, underscores, and hyphens"
    } else if name.chars().count() > profile::MAX_NAME_LEN {
        "profile name is too long"
    } else {
        return Ok(());
    };
    Err(SettingsError::validation("profile", reason))
}

/// Take the value out of a lazily filled slot, opening it on first use
fn get_or_open<T>(slot: &mut Option<T>, open: impl FnOnce() -> Result<T>) -> Result<&mut T> {
    let value = match slot.take() {
        Some(value) => value,
        None => open()?,
    };
    Ok(slot.insert(value))
}

pub struct ProfileManager {
    data_dir: PathBuf,
    profile: String,
    store: Option<KeyValueStore>,
    legacy: Option<LegacyPreferenceTree<TomlFileMedium>>,
}

impl ProfileManager {
    /// Manager for `profile` under `data_dir`; nothing is read until first use
    pub fn new(data_dir: impl Into<PathBuf>, profile: &str) -> Result<Self> {
        validate_profile_name(profile)?;
        let data_dir = data_dir.into();
        info!(profile = %profile, data_dir = %data_dir.display(), "Profile manager ready");
        Ok(Self {
            data_dir,
            profile: profile.to_string(),
            store: None,
            legacy: None,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.resolved_data_dir(), &config.profile)
    }

    pub fn profile_name(&self) -> &str {
        &self.profile
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join(paths::PROFILES_DIR)
    }

    pub fn profile_path(&self) -> PathBuf {
        self.profiles_dir()
            .join(format!("{}.{}", self.profile, paths::PROFILE_EXTENSION))
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.data_dir.join(paths::LEGACY_FILENAME)
    }

    /// True once the profile store has been loaded
    pub fn is_store_open(&self) -> bool {
        self.store.is_some()
    }

    /// Store of the active profile, loaded on first access
    pub fn current_store(&mut self) -> Result<&mut KeyValueStore> {
        let path = self.profile_path();
        let name = self.profile.clone();
        get_or_open(&mut self.store, move || {
            debug!(profile = %name, "Opening profile store");
            KeyValueStore::open(path, name)
        })
    }

    /// Legacy preference tree, loaded on first access
    pub fn legacy_tree(&mut self) -> Result<&mut LegacyPreferenceTree<TomlFileMedium>> {
        let path = self.legacy_path();
        get_or_open(&mut self.legacy, move || {
            debug!(path = %path.display(), "Opening legacy preference tree");
            LegacyPreferenceTree::open(TomlFileMedium::new(path))
        })
    }

    /// The storage generation a caller explicitly asked for
    pub fn backend(&mut self, kind: BackendKind) -> Result<&mut dyn SettingsBackend> {
        match kind {
            BackendKind::Profile => {
                let backend: &mut dyn SettingsBackend = self.current_store()?;
                Ok(backend)
            }
            BackendKind::Legacy => {
                let backend: &mut dyn SettingsBackend = self.legacy_tree()?;
                Ok(backend)
            }
        }
    }

    /// Persist the active profile
    ///
    /// A store that was never opened holds nothing to write.
    pub fn save_profile(&mut self) -> Result<()> {
        match self.store.as_mut() {
            Some(store) => store.save(),
            None => {
                debug!(profile = %self.profile, "Profile store never opened, nothing to save");
                Ok(())
            }
        }
    }

    /// Names of every saved profile, sorted
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let dir = self.profiles_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SettingsError::persistence(
                    format!("Failed to list profiles in {}", dir.display()),
                    e,
                ));
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == paths::PROFILE_EXTENSION)
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Full reset of the legacy tree and the active profile
    pub fn reset_settings(&mut self, controller: &SettingsResetController) -> Result<ResetReport> {
        let store_path = self.profile_path();
        let legacy_path = self.legacy_path();
        let name = self.profile.clone();

        let store = get_or_open(&mut self.store, move || KeyValueStore::open(store_path, name))?;
        let tree = get_or_open(&mut self.legacy, move || {
            LegacyPreferenceTree::open(TomlFileMedium::new(legacy_path))
        })?;

        controller.reset(tree, store)
    }
}

/// [`ProfileManager`] shared between threads
///
/// Saves and resets take the lock for their whole duration, so they never
/// interleave with each other or with access through [`with`](Self::with).
#[derive(Clone)]
pub struct SharedProfileManager {
    inner: Arc<Mutex<ProfileManager>>,
}

impl SharedProfileManager {
    pub fn new(manager: ProfileManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProfileManager> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Profile manager lock poisoned, continuing with last state");
            poisoned.into_inner()
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ProfileManager) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    pub fn save_profile(&self) -> Result<()> {
        self.lock().save_profile()
    }

    pub fn reset_settings(&self, controller: &SettingsResetController) -> Result<ResetReport> {
        self.lock().reset_settings(controller)
    }
}
