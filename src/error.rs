//! Error type shared by every settings operation
//!
//! Single-key reads never produce one of these (they fall back to the caller's
//! default). Multi-step procedures such as saving a profile, resetting settings
//! or sweeping log directories do.

use std::io;
use std::path::{Path, PathBuf};

pub type Result<T, E = SettingsError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    /// The backing medium could not be read or written
    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A directory or node that had to be enumerated does not exist
    #[error("{} not found or unreadable: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Caller-supplied input could not be interpreted
    #[error("invalid value for '{field}': {message}")]
    Validation { field: String, message: String },
}

impl SettingsError {
    pub fn persistence(context: impl Into<String>, source: io::Error) -> Self {
        SettingsError::Persistence {
            context: context.into(),
            source,
        }
    }

    /// Persistence failure that did not originate from an `io::Error`
    /// (e.g. a file that exists but does not parse)
    pub fn corrupt(context: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        SettingsError::Persistence {
            context: context.into(),
            source: io::Error::new(io::ErrorKind::InvalidData, detail.to_string()),
        }
    }

    pub fn not_found(path: &Path, source: io::Error) -> Self {
        SettingsError::NotFound {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SettingsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, SettingsError::Persistence { .. })
    }
}
