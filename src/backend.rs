//! Storage generation abstraction
//!
//! Both the profile store and the legacy preference tree implement
//! [`SettingsBackend`]. Nothing here routes a read from one generation to the
//! other: a caller picks a [`BackendKind`] and only sees that backend's data.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// A single persisted setting value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value, rejecting anything that is not a scalar we store
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

/// Which storage generation a caller is targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Per-profile key-value store (current generation)
    Profile,
    /// Nested preference tree (kept for compatibility and reset)
    Legacy,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Profile => f.write_str("profile"),
            BackendKind::Legacy => f.write_str("legacy"),
        }
    }
}

/// Capability shared by both storage generations
///
/// `scope` is the owner identifier for the profile store and the node path
/// for the legacy tree.
pub trait SettingsBackend {
    fn kind(&self) -> BackendKind;

    /// Raw read; `None` when absent or when the stored text cannot be
    /// represented
    fn read(&self, scope: &str, name: &str) -> Option<SettingValue>;

    fn write(&mut self, scope: &str, name: &str, value: SettingValue) -> Result<()>;

    /// Make previous writes durable
    fn flush(&mut self) -> Result<()>;

    fn bool_or(&self, scope: &str, name: &str, default: bool) -> bool {
        self.read(scope, name)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    fn int_or(&self, scope: &str, name: &str, default: i64) -> i64 {
        self.read(scope, name)
            .and_then(|v| v.as_int())
            .unwrap_or(default)
    }

    fn string_or(&self, scope: &str, name: &str, default: &str) -> String {
        match self.read(scope, name) {
            Some(SettingValue::String(s)) => s,
            _ => default.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_scalars_only() {
        assert_eq!(
            SettingValue::from_json(&serde_json::json!(true)),
            Some(SettingValue::Bool(true))
        );
        assert_eq!(
            SettingValue::from_json(&serde_json::json!(-12)),
            Some(SettingValue::Int(-12))
        );
        assert_eq!(
            SettingValue::from_json(&serde_json::json!("Night")),
            Some(SettingValue::String("Night".to_string()))
        );
        assert_eq!(SettingValue::from_json(&serde_json::json!(1.5)), None);
        assert_eq!(SettingValue::from_json(&serde_json::json!([1, 2])), None);
        assert_eq!(SettingValue::from_json(&serde_json::Value::Null), None);
        assert_eq!(SettingValue::from_json(&serde_json::json!(u64::MAX)), None);
    }

    #[test]
    fn test_typed_accessors_reject_other_types() {
        let value = SettingValue::Int(5);
        assert_eq!(value.as_int(), Some(5));
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.as_str(), None);
    }

    #[test]
    fn test_untagged_serialization() {
        let json = serde_json::to_string(&vec![
            SettingValue::Bool(false),
            SettingValue::Int(3),
            SettingValue::from("Day"),
        ])
        .unwrap();
        assert_eq!(json, r#"[false,3,"Day"]"#);
    }
}
