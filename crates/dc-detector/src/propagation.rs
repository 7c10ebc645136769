//! Per-component control over how a detector takes part in passes.

use crate::detector::Mode;
use crate::error::DetectorError;
use crate::tree::{ChangeDetectorTree, DetectorId};

/// Handle a component uses to steer its own detector.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use dc_core::EvaluatorStrategy;
/// use dc_detector::{ChangeDetectorTree, Mode, NullDispatcher, PipeRegistry, PropagationControl, ProtoChangeDetector};
///
/// let proto = ProtoChangeDetector::new("cmp", Rc::new(PipeRegistry::new()), EvaluatorStrategy::Interpreted);
/// let mut tree = ChangeDetectorTree::new();
/// let id = tree.insert(proto.instantiate(NullDispatcher, &[], &[]));
///
/// let control = PropagationControl::new(id);
/// control.should_not_propagate(&mut tree)?;
/// assert_eq!(tree.mode(id)?, Mode::Detached);
/// control.should_be_propagated(&mut tree)?;
/// assert_eq!(tree.mode(id)?, Mode::CheckOnce);
/// # Ok::<(), dc_detector::DetectorError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationControl {
    detector: DetectorId,
}

impl PropagationControl {
    /// Creates a control for `detector`.
    #[must_use]
    pub const fn new(detector: DetectorId) -> Self {
        Self { detector }
    }

    /// The controlled detector.
    #[must_use]
    pub const fn detector(&self) -> DetectorId {
        self.detector
    }

    /// Checks the detector on the next pass only.
    pub fn should_be_propagated(&self, tree: &mut ChangeDetectorTree) -> Result<(), DetectorError> {
        tree.set_mode(self.detector, Mode::CheckOnce)
    }

    /// Requests a re-check of the detector and its checked ancestors.
    pub fn should_be_propagated_from_root(&self, tree: &mut ChangeDetectorTree) -> Result<(), DetectorError> {
        tree.mark_path_to_root_as_check_once(self.detector)
    }

    /// Detaches the detector from passes.
    pub fn should_not_propagate(&self, tree: &mut ChangeDetectorTree) -> Result<(), DetectorError> {
        tree.set_mode(self.detector, Mode::Detached)
    }

    /// Checks the detector on every pass.
    pub fn should_always_propagate(&self, tree: &mut ChangeDetectorTree) -> Result<(), DetectorError> {
        tree.set_mode(self.detector, Mode::CheckAlways)
    }
}
