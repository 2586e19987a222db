//! Full settings reset
//!
//! Wipes the legacy root and the acquisition-settings node, puts the
//! registration flag back, then asks the current settings object to restore
//! its own defaults. Asking the user for confirmation is the caller's job.

use tracing::{error, info, warn};

use crate::config::legacy::{LegacyNode, LegacyPreferenceTree, PreferenceMedium};
use crate::constants::legacy::{ACQ_SETTINGS_NODE, REGISTRATION};
use crate::error::Result;

/// Hook run as the last reset step
///
/// The controller does not know which settings exist; the implementor decides
/// what "defaults" means.
pub trait ResetToDefaults {
    fn reset_to_defaults(&mut self) -> Result<()>;
}

impl<F> ResetToDefaults for F
where
    F: FnMut() -> Result<()>,
{
    fn reset_to_defaults(&mut self) -> Result<()> {
        self()
    }
}

/// Outcome of a successful reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport {
    /// Registration flag value that was carried across the wipe
    pub registration: bool,
    /// Legacy nodes whose values were cleared
    pub cleared_nodes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SettingsResetController {
    acquisition_node: String,
}

impl Default for SettingsResetController {
    fn default() -> Self {
        Self {
            acquisition_node: ACQ_SETTINGS_NODE.to_string(),
        }
    }
}

impl SettingsResetController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different child of the root as the acquisition-settings node
    pub fn with_acquisition_node(mut self, name: impl Into<String>) -> Self {
        self.acquisition_node = name.into();
        self
    }

    pub fn acquisition_node(&self) -> &str {
        &self.acquisition_node
    }

    /// Reset the legacy tree and the current settings object
    ///
    /// Nothing is cleared unless the registration flag was read from the
    /// medium first. Any failure stops the sequence and is returned.
    pub fn reset<M, S>(&self, tree: &mut LegacyPreferenceTree<M>, settings: &mut S) -> Result<ResetReport>
    where
        M: PreferenceMedium,
        S: ResetToDefaults + ?Sized,
    {
        let root = tree.root();

        let registration = match tree.read_bool(&root, REGISTRATION) {
            Ok(value) => value.unwrap_or(false),
            Err(e) => {
                error!(error = %e, "Could not read registration flag, reset aborted before clearing anything");
                return Err(e);
            }
        };
        info!(registration, "Captured registration flag");

        tree.clear(&root)?;

        let acquisition = LegacyNode::root().child(&self.acquisition_node);
        if let Err(e) = tree.clear(&acquisition) {
            warn!(error = %e, node = %acquisition, "Clearing acquisition settings failed, restoring registration flag");
            if let Err(restore) = tree.put_bool(&root, REGISTRATION, registration) {
                error!(error = %restore, registration, "Registration flag could not be restored");
            }
            return Err(e);
        }

        tree.put_bool(&root, REGISTRATION, registration)?;

        settings.reset_to_defaults()?;

        info!(registration, acquisition = %acquisition, "Settings reset complete");
        Ok(ResetReport {
            registration,
            cleared_nodes: vec![root.to_string(), acquisition.to_string()],
        })
    }
}
