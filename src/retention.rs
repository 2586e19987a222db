//! Log file retention
//!
//! Deletes log files by age from one or more directories while never touching
//! the file the process is currently writing. Every directory is listed
//! before the first deletion, so an unreadable directory aborts the sweep
//! with nothing removed. Individual deletion failures are recorded and the
//! sweep moves on.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::config::store::KeyValueStore;
use crate::constants::retention::{
    DEFAULT_DELETE_OLD_LOGS, DEFAULT_LIFETIME_DAYS, DELETE_OLD_LOGS, LIFETIME_DAYS, OWNER,
    SECONDS_PER_DAY,
};
use crate::error::{Result, SettingsError};

/// A file the sweep wanted to delete but could not
#[derive(Debug)]
pub struct PurgeFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Number of files deleted
    pub removed: usize,
    pub failures: Vec<PurgeFailure>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Retention preferences kept in the profile store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSettings {
    pub delete_old_logs: bool,
    pub lifetime_days: i64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            delete_old_logs: DEFAULT_DELETE_OLD_LOGS,
            lifetime_days: DEFAULT_LIFETIME_DAYS,
        }
    }
}

impl RetentionSettings {
    pub fn load(store: &KeyValueStore) -> Self {
        Self {
            delete_old_logs: store.get_bool(OWNER, DELETE_OLD_LOGS, DEFAULT_DELETE_OLD_LOGS),
            lifetime_days: store.get_int(OWNER, LIFETIME_DAYS, DEFAULT_LIFETIME_DAYS),
        }
    }

    /// Write into the store; call `save` on the store to persist
    pub fn apply(&self, store: &mut KeyValueStore) {
        store.set_bool(OWNER, DELETE_OLD_LOGS, self.delete_old_logs);
        store.set_int(OWNER, LIFETIME_DAYS, self.lifetime_days);
    }

    /// Lifetime usable as a purge age; a negative value means the default
    pub fn lifetime(&self) -> u64 {
        u64::try_from(self.lifetime_days).unwrap_or_else(|_| {
            warn!(lifetime_days = self.lifetime_days, "Negative log lifetime, using default");
            DEFAULT_LIFETIME_DAYS.unsigned_abs()
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogRetentionPolicy {
    prefix: Option<String>,
}

impl LogRetentionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider files whose name starts with `prefix`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Delete files older than `age_days` days from every directory in `dirs`
    ///
    /// `age_days == 0` makes every file a candidate. `current` is never
    /// deleted. Directories naming the same location are swept once.
    pub fn purge_older_than<P: AsRef<Path>>(
        &self,
        dirs: &[P],
        age_days: u64,
        current: Option<&Path>,
    ) -> Result<PurgeReport> {
        let current = current.map(resolve);
        let max_age = Duration::from_secs(age_days.saturating_mul(SECONDS_PER_DAY));
        let now = SystemTime::now();

        let mut seen = BTreeSet::new();
        let mut candidates = Vec::new();

        for dir in dirs {
            let dir = dir.as_ref();
            let canonical =
                fs::canonicalize(dir).map_err(|e| SettingsError::not_found(dir, e))?;
            if !seen.insert(canonical.clone()) {
                debug!(dir = %dir.display(), "Log directory already swept, skipping");
                continue;
            }

            let entries =
                fs::read_dir(&canonical).map_err(|e| SettingsError::not_found(dir, e))?;

            for entry in entries.flatten() {
                let path = entry.path();
                if !entry.file_type().is_ok_and(|t| t.is_file()) {
                    continue;
                }
                if !self.matches_prefix(&path) {
                    continue;
                }
                if current.as_deref() == Some(path.as_path()) {
                    debug!(path = %path.display(), "Skipping current log file");
                    continue;
                }

                let age = match entry.metadata().and_then(|m| m.modified()) {
                    Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Cannot read log file age, keeping it");
                        continue;
                    }
                };

                if age_days == 0 || age > max_age {
                    candidates.push(path);
                }
            }
        }

        let mut report = PurgeReport::default();
        for path in candidates {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Deleted old log file");
                    report.removed += 1;
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "Failed to delete log file");
                    report.failures.push(PurgeFailure { path, error });
                }
            }
        }

        info!(
            removed = report.removed,
            failed = report.failures.len(),
            age_days,
            "Log retention sweep finished"
        );
        Ok(report)
    }

    /// Housekeeping run at startup
    ///
    /// Purges with the configured lifetime when the profile enables it and
    /// does nothing otherwise.
    pub fn startup_sweep<P: AsRef<Path>>(
        &self,
        store: &KeyValueStore,
        dirs: &[P],
        current: Option<&Path>,
    ) -> Result<PurgeReport> {
        let settings = RetentionSettings::load(store);
        if !settings.delete_old_logs {
            debug!("Deleting old logs is disabled");
            return Ok(PurgeReport::default());
        }
        self.purge_older_than(dirs, settings.lifetime(), current)
    }

    fn matches_prefix(&self, path: &Path) -> bool {
        match &self.prefix {
            None => true,
            Some(prefix) => path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix.as_str())),
        }
    }
}

/// Canonical form of `path`, or its absolute form when it cannot be resolved
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(n: u64) -> Duration {
        Duration::from_secs(n * SECONDS_PER_DAY)
    }

    fn log_file(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"log line\n").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[test]
    fn test_only_files_past_lifetime_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let a = log_file(dir.path(), "a.log", days(10));
        let b = log_file(dir.path(), "b.log", days(40));
        let c = log_file(dir.path(), "c.log", Duration::ZERO);

        let report = LogRetentionPolicy::new()
            .purge_older_than(&[dir.path()], 30, Some(c.as_path()))
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(report.is_clean());
        assert!(a.exists());
        assert!(!b.exists());
        assert!(c.exists());
    }

    #[test]
    fn test_zero_days_deletes_everything_but_current() {
        let dir = tempfile::tempdir().unwrap();
        let old = log_file(dir.path(), "old.log", days(3));
        let fresh = log_file(dir.path(), "fresh.log", Duration::ZERO);
        let current = log_file(dir.path(), "current.log", Duration::ZERO);

        let report = LogRetentionPolicy::new()
            .purge_older_than(&[dir.path()], 0, Some(current.as_path()))
            .unwrap();

        assert_eq!(report.removed, 2);
        assert!(!old.exists());
        assert!(!fresh.exists());
        assert!(current.exists());
    }

    #[test]
    fn test_current_file_matched_through_relative_components() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let current = log_file(dir.path(), "current.log", days(90));
        let indirect = dir.path().join("sub").join("..").join("current.log");

        let report = LogRetentionPolicy::new()
            .purge_older_than(&[dir.path()], 1, Some(indirect.as_path()))
            .unwrap();

        assert_eq!(report.removed, 0);
        assert!(current.exists());
    }

    #[test]
    fn test_file_within_lifetime_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let edge = log_file(dir.path(), "edge.log", days(5) - Duration::from_secs(60));

        let report = LogRetentionPolicy::new()
            .purge_older_than(&[dir.path()], 5, None)
            .unwrap();

        assert_eq!(report.removed, 0);
        assert!(edge.exists());
    }

    #[test]
    fn test_missing_directory_aborts_before_deleting() {
        let dir = tempfile::tempdir().unwrap();
        let old = log_file(dir.path(), "old.log", days(60));
        let missing = dir.path().join("CoreLogs");

        let err = LogRetentionPolicy::new()
            .purge_older_than(&[dir.path().to_path_buf(), missing.clone()], 1, None)
            .expect_err("missing dir");

        match err {
            SettingsError::NotFound { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
        assert!(old.exists());
    }

    #[test]
    fn test_same_directory_swept_once() {
        let dir = tempfile::tempdir().unwrap();
        log_file(dir.path(), "old.log", days(60));
        let alias = dir.path().join(".");

        let report = LogRetentionPolicy::new()
            .purge_older_than(&[dir.path().to_path_buf(), alias], 1, None)
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(report.is_clean());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_delete_is_recorded_and_sweep_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let writable = dir.path().join("logs");
        let locked = dir.path().join("CoreLogs");
        fs::create_dir(&writable).unwrap();
        fs::create_dir(&locked).unwrap();
        let free = log_file(&writable, "free.log", days(60));
        let stuck = log_file(&locked, "stuck.log", days(60));

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        if fs::write(locked.join("write-check"), b"").is_ok() {
            // permissions are not enforced (running as root)
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = LogRetentionPolicy::new().purge_older_than(&[&locked, &writable], 0, None);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let report = result.unwrap();

        assert_eq!(report.removed, 1);
        assert!(!free.exists());
        assert!(stuck.exists());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, fs::canonicalize(&stuck).unwrap());
        assert_eq!(report.failures[0].error.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_subdirectories_are_not_touched() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("archive");
        fs::create_dir(&nested).unwrap();
        let inner = log_file(&nested, "inner.log", days(60));

        let report = LogRetentionPolicy::new()
            .purge_older_than(&[dir.path()], 0, None)
            .unwrap();

        assert_eq!(report.removed, 0);
        assert!(nested.exists());
        assert!(inner.exists());
    }

    #[test]
    fn test_prefix_filter() {
        let dir = tempfile::tempdir().unwrap();
        let core = log_file(dir.path(), "CoreLog20240101.txt", days(60));
        let other = log_file(dir.path(), "notes.txt", days(60));

        let report = LogRetentionPolicy::new()
            .with_prefix("CoreLog")
            .purge_older_than(&[dir.path()], 30, None)
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(!core.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_retention_settings_defaults_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = KeyValueStore::new(dir.path().join("default.json"), "default");

        let defaults = RetentionSettings::load(&store);
        assert!(!defaults.delete_old_logs);
        assert_eq!(defaults.lifetime_days, 7);

        RetentionSettings {
            delete_old_logs: true,
            lifetime_days: 30,
        }
        .apply(&mut store);

        let loaded = RetentionSettings::load(&store);
        assert!(loaded.delete_old_logs);
        assert_eq!(loaded.lifetime(), 30);
    }

    #[test]
    fn test_negative_lifetime_uses_default() {
        let settings = RetentionSettings {
            delete_old_logs: true,
            lifetime_days: -4,
        };
        assert_eq!(settings.lifetime(), 7);
    }

    #[test]
    fn test_startup_sweep_respects_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir(&logs).unwrap();
        let old = log_file(&logs, "old.log", days(20));
        let recent = log_file(&logs, "recent.log", days(2));

        let mut store = KeyValueStore::new(dir.path().join("default.json"), "default");
        let policy = LogRetentionPolicy::new();

        let report = policy.startup_sweep(&store, &[&logs], None).unwrap();
        assert_eq!(report.removed, 0);
        assert!(old.exists());

        RetentionSettings {
            delete_old_logs: true,
            lifetime_days: 7,
        }
        .apply(&mut store);

        let report = policy.startup_sweep(&store, &[&logs], None).unwrap();
        assert_eq!(report.removed, 1);
        assert!(!old.exists());
        assert!(recent.exists());
    }
}
