//! User settings and preference persistence
//!
//! Settings are typed values addressed by an owner and a name. They live in a
//! per-profile key-value store; an older nested preference tree is kept next
//! to it for compatibility and for the full reset. Log retention reads its
//! own policy from the same store.

#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod fields;
pub mod reset;
pub mod retention;

pub use backend::{BackendKind, SettingValue, SettingsBackend};
pub use config::{AppConfig, KeyValueStore, LegacyNode, LegacyPreferenceTree, ProfileManager, SharedProfileManager};
pub use error::{Result, SettingsError};
pub use fields::{parse_display_int, PendingEdits};
pub use reset::{ResetReport, ResetToDefaults, SettingsResetController};
pub use retention::{LogRetentionPolicy, PurgeReport, RetentionSettings};
