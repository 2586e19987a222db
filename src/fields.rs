//! Commit of edited fields
//!
//! A form collects raw text for several settings and writes them together
//! when it closes. Every entry is parsed before anything is written, so one
//! bad number leaves the store exactly as it was.

use std::ops::RangeInclusive;
use tracing::{debug, warn};

use crate::backend::SettingValue;
use crate::config::store::KeyValueStore;
use crate::error::{Result, SettingsError};

/// Parse an integer the way it is shown to users
///
/// Surrounding whitespace is ignored and `,` or `_` may group digits, so
/// `" 1,024 "` and `"-1_000"` are accepted.
pub fn parse_display_int(field: &str, text: &str) -> Result<i64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();

    if cleaned.is_empty() {
        return Err(SettingsError::validation(field, "a whole number is required"));
    }

    cleaned.parse::<i64>().map_err(|_| {
        SettingsError::validation(field, format!("'{}' is not a whole number", text.trim()))
    })
}

fn parse_display_bool(field: &str, text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(SettingsError::validation(
            field,
            format!("'{other}' is not true or false"),
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Int { range: Option<RangeInclusive<i64>> },
    Bool,
    Text,
}

#[derive(Debug, Clone)]
struct PendingEdit {
    owner: String,
    name: String,
    text: String,
    kind: FieldKind,
}

impl PendingEdit {
    fn parse(&self) -> Result<SettingValue> {
        match &self.kind {
            FieldKind::Int { range } => {
                let value = parse_display_int(&self.name, &self.text)?;
                match range {
                    Some(range) if !range.contains(&value) => Err(SettingsError::validation(
                        &self.name,
                        format!(
                            "{value} is outside {}..={}",
                            range.start(),
                            range.end()
                        ),
                    )),
                    _ => Ok(SettingValue::Int(value)),
                }
            }
            FieldKind::Bool => parse_display_bool(&self.name, &self.text).map(SettingValue::Bool),
            FieldKind::Text => Ok(SettingValue::String(self.text.clone())),
        }
    }
}

/// Raw field text waiting to be committed to a profile store
#[derive(Debug, Clone, Default)]
pub struct PendingEdits {
    edits: Vec<PendingEdit>,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_int(&mut self, owner: &str, name: &str, text: &str) -> &mut Self {
        self.push(owner, name, text, FieldKind::Int { range: None })
    }

    /// Integer field that must fall inside `range`
    pub fn push_int_in(
        &mut self,
        owner: &str,
        name: &str,
        text: &str,
        range: RangeInclusive<i64>,
    ) -> &mut Self {
        self.push(owner, name, text, FieldKind::Int { range: Some(range) })
    }

    pub fn push_bool(&mut self, owner: &str, name: &str, text: &str) -> &mut Self {
        self.push(owner, name, text, FieldKind::Bool)
    }

    pub fn push_text(&mut self, owner: &str, name: &str, text: &str) -> &mut Self {
        self.push(owner, name, text, FieldKind::Text)
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Parse every entry without touching any store
    pub fn validate(&self) -> Result<()> {
        self.parse_all().map(|_| ())
    }

    /// Write every entry to `store`, or none of them
    ///
    /// Returns the number of settings written. The store is not saved.
    pub fn commit(&self, store: &mut KeyValueStore) -> Result<usize> {
        let parsed = self.parse_all().inspect_err(|e| {
            warn!(error = %e, "Rejected field edits, nothing written");
        })?;

        for (edit, value) in self.edits.iter().zip(parsed) {
            match value {
                SettingValue::Bool(b) => store.set_bool(&edit.owner, &edit.name, b),
                SettingValue::Int(i) => store.set_int(&edit.owner, &edit.name, i),
                SettingValue::String(s) => store.set_string(&edit.owner, &edit.name, &s),
            }
        }

        debug!(count = self.edits.len(), "Committed field edits");
        Ok(self.edits.len())
    }

    fn push(&mut self, owner: &str, name: &str, text: &str, kind: FieldKind) -> &mut Self {
        self.edits.push(PendingEdit {
            owner: owner.to_string(),
            name: name.to_string(),
            text: text.to_string(),
            kind,
        });
        self
    }

    fn parse_all(&self) -> Result<Vec<SettingValue>> {
        self.edits.iter().map(PendingEdit::parse).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "OptionsDlg";

    fn store() -> (tempfile::TempDir, KeyValueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyValueStore::new(dir.path().join("default.json"), "default");
        (dir, store)
    }

    #[test]
    fn test_parse_display_int() {
        assert_eq!(parse_display_int("f", "42").unwrap(), 42);
        assert_eq!(parse_display_int("f", "  1,024 ").unwrap(), 1024);
        assert_eq!(parse_display_int("f", "-1_000").unwrap(), -1000);
        assert_eq!(parse_display_int("f", "+7").unwrap(), 7);

        for bad in ["", "   ", "abc", "12.5", "1e3", "99999999999999999999"] {
            let err = parse_display_int("buffer size", bad).expect_err(bad);
            assert!(matches!(err, SettingsError::Validation { ref field, .. } if field == "buffer size"));
        }
    }

    #[test]
    fn test_commit_writes_every_field() {
        let (_dir, mut store) = store();
        let mut edits = PendingEdits::new();
        edits
            .push_int(OWNER, "buffer size", "2,048")
            .push_bool(OWNER, "debugLog", "Yes")
            .push_text(OWNER, "startup script", "MMStartup.bsh");

        assert_eq!(edits.commit(&mut store).unwrap(), 3);
        assert_eq!(store.get_int(OWNER, "buffer size", 25), 2048);
        assert!(store.get_bool(OWNER, "debugLog", false));
        assert_eq!(store.get_string(OWNER, "startup script", ""), "MMStartup.bsh");
    }

    #[test]
    fn test_one_bad_field_writes_nothing() {
        let (_dir, mut store) = store();
        store.set_int(OWNER, "buffer size", 25);

        let mut edits = PendingEdits::new();
        edits
            .push_int(OWNER, "buffer size", "512")
            .push_int(OWNER, "core log lifetime days", "seven");

        let err = edits.commit(&mut store).expect_err("must reject");
        assert_eq!(
            err.to_string(),
            "invalid value for 'core log lifetime days': 'seven' is not a whole number"
        );
        assert_eq!(store.get_int(OWNER, "buffer size", 0), 25);
        assert!(!store.contains(OWNER, "core log lifetime days"));
    }

    #[test]
    fn test_range_checked_int() {
        let (_dir, mut store) = store();
        let mut edits = PendingEdits::new();
        edits.push_int_in(OWNER, "lifetime", "-3", 0..=3650);

        assert!(edits.validate().is_err());
        assert!(edits.commit(&mut store).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_edits_commit_nothing() {
        let (_dir, mut store) = store();
        let edits = PendingEdits::new();
        assert!(edits.is_empty());
        assert_eq!(edits.commit(&mut store).unwrap(), 0);
        assert!(!store.is_dirty());
    }
}
