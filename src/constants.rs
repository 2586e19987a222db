//! Application-wide constants
//!
//! File names, owner identifiers and legacy key names that must stay stable
//! across releases. Changing any value in `legacy` or `retention` orphans data
//! already persisted by earlier versions.

/// On-disk layout
pub mod paths {
    /// Directory under the platform config/data dirs
    pub const APP_DIR: &str = "scope-settings";

    /// Application config filename (TOML)
    pub const CONFIG_FILENAME: &str = "config.toml";

    /// Directory (under the data dir) holding one JSON file per profile
    pub const PROFILES_DIR: &str = "profiles";

    /// Extension of profile files
    pub const PROFILE_EXTENSION: &str = "json";

    /// Legacy preference tree file (TOML)
    pub const LEGACY_FILENAME: &str = "legacy_prefs.toml";

    /// Default log directory name (under the data dir)
    pub const LOG_DIR: &str = "logs";

    /// Pre-profile log directory name (under the data dir)
    pub const LEGACY_LOG_DIR: &str = "CoreLogs";
}

/// Profile defaults
pub mod profile {
    /// Profile used when none is configured
    pub const DEFAULT_PROFILE: &str = "default";

    /// Longest accepted profile name
    pub const MAX_NAME_LEN: usize = 100;

    /// Version written into profile files
    pub const FILE_VERSION: u32 = 1;
}

/// Legacy preference tree names
pub mod legacy {
    /// Boolean at the root that survives a full reset
    pub const REGISTRATION: &str = "registration";

    /// Child of the root holding acquisition settings
    pub const ACQ_SETTINGS_NODE: &str = "AcquisitionSettings";

    /// Node path separator
    pub const PATH_SEPARATOR: char = '/';
}

/// Log retention keys (stored in the profile store)
pub mod retention {
    /// Owner identifier for retention settings
    pub const OWNER: &str = "LogRetentionPolicy";

    /// Whether old logs are deleted at startup
    pub const DELETE_OLD_LOGS: &str = "should delete old core logs";

    /// Maximum age in days kept by the startup sweep
    pub const LIFETIME_DAYS: &str = "core log lifetime days";

    pub const DEFAULT_DELETE_OLD_LOGS: bool = false;
    pub const DEFAULT_LIFETIME_DAYS: i64 = 7;

    /// Prefix of log files written by the core
    pub const CORE_LOG_PREFIX: &str = "CoreLog";

    pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
}
