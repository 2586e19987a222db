//! Legacy preference tree
//!
//! The older settings generation: a tree of named nodes, each holding textual
//! key/value pairs. It is kept so old values stay readable and so a full reset
//! can wipe it. New settings are never written here by the profile manager.
//!
//! The tree is a write-through cache over a [`PreferenceMedium`]. Mutations are
//! applied to a copy, stored, and only then adopted, so a failed store leaves
//! the cached tree exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backend::{BackendKind, SettingValue, SettingsBackend};
use crate::config::write_atomically;
use crate::constants::legacy::PATH_SEPARATOR;
use crate::error::{Result, SettingsError};

/// Stored contents of one node and, recursively, its children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyNodeData {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, LegacyNodeData>,
}

impl LegacyNodeData {
    fn find(&self, segments: &[String]) -> Option<&LegacyNodeData> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.nodes.get(segment))
    }

    fn find_or_create(&mut self, segments: &[String]) -> &mut LegacyNodeData {
        segments.iter().fold(self, |node, segment| {
            node.nodes.entry(segment.clone()).or_default()
        })
    }
}

/// Where the legacy tree is persisted
pub trait PreferenceMedium {
    fn load(&self) -> Result<LegacyNodeData>;
    fn store(&mut self, root: &LegacyNodeData) -> Result<()>;
}

/// Legacy tree kept in a TOML file
#[derive(Debug, Clone)]
pub struct TomlFileMedium {
    path: PathBuf,
}

impl TomlFileMedium {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceMedium for TomlFileMedium {
    fn load(&self) -> Result<LegacyNodeData> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LegacyNodeData::default()),
            Err(e) => {
                return Err(SettingsError::persistence(
                    format!("Failed to read legacy preferences {}", self.path.display()),
                    e,
                ));
            }
        };

        toml::from_str(&contents).map_err(|e| {
            SettingsError::corrupt(
                format!("Failed to parse legacy preferences {}", self.path.display()),
                e,
            )
        })
    }

    fn store(&mut self, root: &LegacyNodeData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::persistence(
                    format!("Failed to create directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let contents = toml::to_string_pretty(root).map_err(|e| {
            SettingsError::corrupt("Failed to serialize legacy preferences", e)
        })?;

        write_atomically(&self.path, contents.as_bytes()).map_err(|e| {
            SettingsError::persistence(
                format!("Failed to write legacy preferences {}", self.path.display()),
                e,
            )
        })
    }
}

/// Legacy tree kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    data: LegacyNodeData,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: LegacyNodeData) -> Self {
        Self { data }
    }

    /// What a fresh load would return
    pub fn snapshot(&self) -> &LegacyNodeData {
        &self.data
    }
}

impl PreferenceMedium for MemoryMedium {
    fn load(&self) -> Result<LegacyNodeData> {
        Ok(self.data.clone())
    }

    fn store(&mut self, root: &LegacyNodeData) -> Result<()> {
        self.data = root.clone();
        Ok(())
    }
}

/// Address of a node in the tree
///
/// A handle is only a path; it is resolved again on every operation, so it
/// stays valid across a clear or reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LegacyNode {
    segments: Vec<String>,
}

impl LegacyNode {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-delimited path; a leading slash and empty segments are
    /// ignored, so `""`, `"/"` and `"//"` all name the root
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split(PATH_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(LegacyNode::parse(name).segments);
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for LegacyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PATH_SEPARATOR}{}", self.segments.join("/"))
    }
}

pub struct LegacyPreferenceTree<M: PreferenceMedium> {
    medium: M,
    root: LegacyNodeData,
}

impl<M: PreferenceMedium> LegacyPreferenceTree<M> {
    /// Load the tree from its medium
    pub fn open(medium: M) -> Result<Self> {
        let root = medium.load()?;
        debug!(nodes = root.nodes.len(), values = root.values.len(), "Opened legacy preference tree");
        Ok(Self { medium, root })
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    pub fn root(&self) -> LegacyNode {
        LegacyNode::root()
    }

    /// Node at `path` relative to the root, created if absent
    pub fn node(&mut self, path: &str) -> LegacyNode {
        let node = LegacyNode::parse(path);
        self.root.find_or_create(&node.segments);
        node
    }

    pub fn node_exists(&self, node: &LegacyNode) -> bool {
        self.root.find(&node.segments).is_some()
    }

    /// Discard the cache and load the medium again
    pub fn reload(&mut self) -> Result<()> {
        self.root = self.medium.load()?;
        Ok(())
    }

    pub fn get_raw(&self, node: &LegacyNode, key: &str) -> Option<&str> {
        self.root
            .find(&node.segments)
            .and_then(|data| data.values.get(key))
            .map(String::as_str)
    }

    pub fn get_bool(&self, node: &LegacyNode, key: &str, default: bool) -> bool {
        self.get_raw(node, key)
            .and_then(parse_bool)
            .unwrap_or(default)
    }

    pub fn get_int(&self, node: &LegacyNode, key: &str, default: i64) -> i64 {
        self.get_raw(node, key)
            .and_then(|text| text.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_string(&self, node: &LegacyNode, key: &str, default: &str) -> String {
        self.get_raw(node, key).unwrap_or(default).to_string()
    }

    /// Checked boolean read straight from the medium
    ///
    /// Unlike [`get_bool`](Self::get_bool) this reports a medium failure
    /// instead of masking it. `Ok(None)` means absent or not a boolean.
    pub fn read_bool(&mut self, node: &LegacyNode, key: &str) -> Result<Option<bool>> {
        self.reload()?;
        Ok(self.get_raw(node, key).and_then(parse_bool))
    }

    pub fn put_bool(&mut self, node: &LegacyNode, key: &str, value: bool) -> Result<()> {
        self.put_raw(node, key, value.to_string())
    }

    pub fn put_int(&mut self, node: &LegacyNode, key: &str, value: i64) -> Result<()> {
        self.put_raw(node, key, value.to_string())
    }

    pub fn put_string(&mut self, node: &LegacyNode, key: &str, value: &str) -> Result<()> {
        self.put_raw(node, key, value.to_string())
    }

    pub fn remove(&mut self, node: &LegacyNode, key: &str) -> Result<()> {
        if self.get_raw(node, key).is_none() {
            return Ok(());
        }
        self.commit(|root| {
            root.find_or_create(&node.segments).values.remove(key);
        })
    }

    /// Remove the key/value pairs stored directly on `node`
    ///
    /// Child nodes and their values are left untouched.
    pub fn clear(&mut self, node: &LegacyNode) -> Result<()> {
        self.commit(|root| {
            root.find_or_create(&node.segments).values.clear();
        })?;
        info!(node = %node, "Cleared legacy preference node");
        Ok(())
    }

    pub fn keys(&self, node: &LegacyNode) -> Vec<String> {
        self.root
            .find(&node.segments)
            .map(|data| data.values.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn child_names(&self, node: &LegacyNode) -> Vec<String> {
        self.root
            .find(&node.segments)
            .map(|data| data.nodes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Write the cached tree to the medium
    pub fn sync(&mut self) -> Result<()> {
        self.medium.store(&self.root)
    }

    fn put_raw(&mut self, node: &LegacyNode, key: &str, value: String) -> Result<()> {
        debug!(node = %node, key = %key, value = %value, "Legacy preference updated");
        self.commit(|root| {
            root.find_or_create(&node.segments)
                .values
                .insert(key.to_string(), value);
        })
    }

    fn commit(&mut self, mutate: impl FnOnce(&mut LegacyNodeData)) -> Result<()> {
        let mut next = self.root.clone();
        mutate(&mut next);
        self.medium.store(&next)?;
        self.root = next;
        Ok(())
    }
}

/// Booleans are stored as text; anything other than true/false is absent
fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl<M: PreferenceMedium> SettingsBackend for LegacyPreferenceTree<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::Legacy
    }

    /// Legacy values carry no type; they are always returned as text
    fn read(&self, scope: &str, name: &str) -> Option<SettingValue> {
        self.get_raw(&LegacyNode::parse(scope), name)
            .map(|text| SettingValue::String(text.to_string()))
    }

    fn write(&mut self, scope: &str, name: &str, value: SettingValue) -> Result<()> {
        self.put_raw(&LegacyNode::parse(scope), name, value.to_string())
    }

    fn flush(&mut self) -> Result<()> {
        self.sync()
    }

    fn bool_or(&self, scope: &str, name: &str, default: bool) -> bool {
        self.get_bool(&LegacyNode::parse(scope), name, default)
    }

    fn int_or(&self, scope: &str, name: &str, default: i64) -> i64 {
        self.get_int(&LegacyNode::parse(scope), name, default)
    }

    fn string_or(&self, scope: &str, name: &str, default: &str) -> String {
        self.get_string(&LegacyNode::parse(scope), name, default)
    }
}
