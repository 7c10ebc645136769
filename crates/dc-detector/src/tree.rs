//! The change detector tree.
//!
//! Detectors live in an arena addressed by generational [`DetectorId`]
//! handles. Each node owns an ordered child list and keeps a non-owning
//! parent handle, so upward walks and detaching are O(1) per step and no
//! reference cycles exist. A handle goes stale once its detector is
//! destroyed; stale handles are rejected with
//! [`DetectorError::UnknownDetector`] even after the slot is reused.
//!
//! # Passes
//!
//! [`detect_changes`](ChangeDetectorTree::detect_changes) visits the subtree
//! depth-first in child order. A node in [`Mode::Checked`] or
//! [`Mode::Detached`] is skipped together with its descendants. Otherwise
//! its own records are checked, then its children, and a node in
//! [`Mode::CheckOnce`] becomes [`Mode::Checked`]. The first error aborts the
//! rest of the pass.

use std::fmt;
use std::rc::Rc;

use dc_core::Value;
use dc_expr::Locals;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::detector::{ChangeDetector, Mode};
use crate::error::DetectorError;

/// Handle to a detector in a [`ChangeDetectorTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectorId {
    index: usize,
    generation: u32,
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "detector#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Node {
    detector: ChangeDetector,
    parent: Option<DetectorId>,
    children: SmallVec<[DetectorId; 4]>,
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    node: Option<Node>,
}

/// Arena of change detectors linked into parent/child trees.
#[derive(Debug, Default)]
pub struct ChangeDetectorTree {
    entries: Vec<Entry>,
    free: Vec<usize>,
}

impl ChangeDetectorTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// Returns `true` if no detector is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a detector as a new root.
    pub fn insert(&mut self, detector: ChangeDetector) -> DetectorId {
        let node = Node {
            detector,
            parent: None,
            children: SmallVec::new(),
        };
        if let Some(index) = self.free.pop() {
            if let Some(entry) = self.entries.get_mut(index) {
                entry.node = Some(node);
                return DetectorId {
                    index,
                    generation: entry.generation,
                };
            }
        }
        self.entries.push(Entry {
            generation: 0,
            node: Some(node),
        });
        DetectorId {
            index: self.entries.len() - 1,
            generation: 0,
        }
    }

    fn node(&self, id: DetectorId) -> Result<&Node, DetectorError> {
        self.entries
            .get(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_ref())
            .ok_or(DetectorError::UnknownDetector(id))
    }

    fn node_mut(&mut self, id: DetectorId) -> Result<&mut Node, DetectorError> {
        self.entries
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_mut())
            .ok_or(DetectorError::UnknownDetector(id))
    }

    /// Returns `true` if `id` names a live detector.
    #[must_use]
    pub fn contains(&self, id: DetectorId) -> bool {
        self.node(id).is_ok()
    }

    /// The detector behind `id`.
    #[must_use]
    pub fn get(&self, id: DetectorId) -> Option<&ChangeDetector> {
        self.node(id).ok().map(|node| &node.detector)
    }

    /// The detector behind `id`, mutably.
    pub fn get_mut(&mut self, id: DetectorId) -> Option<&mut ChangeDetector> {
        self.node_mut(id).ok().map(|node| &mut node.detector)
    }

    /// The parent of `id`, or `None` for a root.
    pub fn parent(&self, id: DetectorId) -> Result<Option<DetectorId>, DetectorError> {
        Ok(self.node(id)?.parent)
    }

    /// The children of `id` in check order.
    pub fn children(&self, id: DetectorId) -> Result<&[DetectorId], DetectorError> {
        Ok(&self.node(id)?.children)
    }

    /// Appends `child` to the children of `parent`.
    ///
    /// `child` must be a root, and must not be `parent` or one of its
    /// ancestors.
    pub fn add_child(&mut self, parent: DetectorId, child: DetectorId) -> Result<(), DetectorError> {
        if let Some(current) = self.node(child)?.parent {
            return Err(DetectorError::AlreadyAttached { parent: current, child });
        }
        let mut cursor = Some(parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(DetectorError::WouldCreateCycle { parent, child });
            }
            cursor = self.node(ancestor)?.parent;
        }
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        trace!(%parent, %child, "attached child detector");
        Ok(())
    }

    /// Detaches `child` from `parent`; `child` becomes a root.
    pub fn remove_child(&mut self, parent: DetectorId, child: DetectorId) -> Result<(), DetectorError> {
        self.node(child)?;
        let children = &mut self.node_mut(parent)?.children;
        let position = children
            .iter()
            .position(|&id| id == child)
            .ok_or(DetectorError::NotAChild { parent, child })?;
        children.remove(position);
        self.node_mut(child)?.parent = None;
        trace!(%parent, %child, "detached child detector");
        Ok(())
    }

    /// Detaches `id` from its parent. Does nothing for a root.
    pub fn remove(&mut self, id: DetectorId) -> Result<(), DetectorError> {
        match self.node(id)?.parent {
            Some(parent) => self.remove_child(parent, id),
            None => Ok(()),
        }
    }

    /// Detaches `id`, then dehydrates and frees it with its whole subtree.
    ///
    /// Every handle into the subtree becomes stale.
    pub fn destroy(&mut self, id: DetectorId) -> Result<(), DetectorError> {
        self.remove(id)?;
        let mut pending = vec![id];
        let mut destroyed = 0_usize;
        while let Some(current) = pending.pop() {
            let Some(entry) = self.entries.get_mut(current.index) else {
                continue;
            };
            let Some(mut node) = entry.node.take() else {
                continue;
            };
            entry.generation = entry.generation.wrapping_add(1);
            self.free.push(current.index);
            node.detector.dehydrate();
            pending.extend(node.children.iter().copied());
            destroyed += 1;
        }
        debug!(root = %id, destroyed, "destroyed detector subtree");
        Ok(())
    }

    /// The mode of `id`.
    pub fn mode(&self, id: DetectorId) -> Result<Mode, DetectorError> {
        Ok(self.node(id)?.detector.mode())
    }

    /// Sets the mode of `id`.
    pub fn set_mode(&mut self, id: DetectorId, mode: Mode) -> Result<(), DetectorError> {
        self.node_mut(id)?.detector.set_mode(mode);
        Ok(())
    }

    /// Binds `context` and `locals` to `id`.
    pub fn hydrate(
        &mut self,
        id: DetectorId,
        context: Value,
        locals: Option<Rc<Locals>>,
    ) -> Result<(), DetectorError> {
        self.node_mut(id)?.detector.hydrate(context, locals);
        Ok(())
    }

    /// Destroys the pipes of `id`, clears its cache and unbinds its context.
    pub fn dehydrate(&mut self, id: DetectorId) -> Result<(), DetectorError> {
        self.node_mut(id)?.detector.dehydrate();
        Ok(())
    }

    /// Returns `true` if `id` has a context bound.
    pub fn hydrated(&self, id: DetectorId) -> Result<bool, DetectorError> {
        Ok(self.node(id)?.detector.hydrated())
    }

    /// Runs a change detection pass over the subtree rooted at `id`.
    pub fn detect_changes(&mut self, id: DetectorId) -> Result<(), DetectorError> {
        self.run(id, false)
    }

    /// Runs a verification pass over the subtree rooted at `id`, failing on
    /// the first record whose value differs from its cached value.
    pub fn check_no_changes(&mut self, id: DetectorId) -> Result<(), DetectorError> {
        self.run(id, true)
    }

    fn run(&mut self, id: DetectorId, throw_on_change: bool) -> Result<(), DetectorError> {
        let node = self.node_mut(id)?;
        let mode = node.detector.mode();
        if mode.is_skipped() {
            trace!(detector = %id, %mode, "skipping subtree");
            return Ok(());
        }
        node.detector.check_records(throw_on_change)?;

        let mut index = 0;
        while let Some(child) = self.node(id)?.children.get(index).copied() {
            self.run(child, throw_on_change)?;
            index += 1;
        }

        let detector = &mut self.node_mut(id)?.detector;
        if detector.mode() == Mode::CheckOnce {
            detector.set_mode(Mode::Checked);
        }
        Ok(())
    }

    /// Walks from `id` to the root, turning every [`Mode::Checked`] node into
    /// [`Mode::CheckOnce`]. The walk stops at the first [`Mode::Detached`]
    /// node, which is left unchanged.
    pub fn mark_path_to_root_as_check_once(&mut self, id: DetectorId) -> Result<(), DetectorError> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node_mut(current)?;
            match node.detector.mode() {
                Mode::Detached => break,
                Mode::Checked => node.detector.set_mode(Mode::CheckOnce),
                Mode::CheckAlways | Mode::CheckOnce => {}
            }
            cursor = node.parent;
        }
        Ok(())
    }
}
