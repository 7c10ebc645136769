//! Drives passes over a root detector.

use dc_core::EngineConfig;
use tracing::{debug, error};

use crate::error::DetectorError;
use crate::tree::{ChangeDetectorTree, DetectorId};

/// Runs one change detection pass per tick, optionally followed by a
/// verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifeCycle {
    root: DetectorId,
    enforce_no_new_changes: bool,
}

impl LifeCycle {
    /// Creates a life cycle for `root`.
    #[must_use]
    pub const fn new(root: DetectorId, enforce_no_new_changes: bool) -> Self {
        Self {
            root,
            enforce_no_new_changes,
        }
    }

    /// Creates a life cycle for `root` from the engine configuration.
    #[must_use]
    pub const fn from_config(root: DetectorId, config: &EngineConfig) -> Self {
        Self::new(root, config.enforce_no_new_changes)
    }

    /// The detector ticks start from.
    #[must_use]
    pub const fn root(&self) -> DetectorId {
        self.root
    }

    /// Moves ticks to another root.
    pub fn register_with(&mut self, root: DetectorId) {
        self.root = root;
    }

    /// Runs `detect_changes` on the root, then `check_no_changes` when
    /// verification is enabled. Failures are logged and returned.
    pub fn tick(&self, tree: &mut ChangeDetectorTree) -> Result<(), DetectorError> {
        debug!(root = %self.root, verify = self.enforce_no_new_changes, "tick");
        let result = tree.detect_changes(self.root).and_then(|()| {
            if self.enforce_no_new_changes {
                tree.check_no_changes(self.root)
            } else {
                Ok(())
            }
        });
        if let Err(err) = &result {
            error!(root = %self.root, error = %err, "change detection failed");
        }
        result
    }
}
