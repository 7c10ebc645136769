//! Change detection for the dirtycheck engine.
//!
//! This crate provides:
//!
//! - [`Pipe`] / [`PipeFactory`] / [`PipeRegistry`] - stateful value
//!   transforms selected by name and value
//! - [`pipes`] - the built-in list, map and null pipes
//! - [`ProtoChangeDetector`] - a reusable template that instantiates
//!   [`ChangeDetector`]s from [`BindingRecord`]s
//! - [`ChangeDetectorTree`] - the arena of detectors with modes, hydration
//!   and the dirty-check passes
//! - [`ChangeDispatcher`] - the consumer of grouped [`ChangeRecord`]s
//! - [`LifeCycle`] and [`PropagationControl`] - drivers on top of the tree
//!
//! # Examples
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use dc_core::{EvaluatorStrategy, Record, Value};
//! use dc_detector::{BindingRecord, ChangeDetectorTree, ChangeLog, PipeRegistry, ProtoChangeDetector};
//! use dc_expr::Parser;
//!
//! let mut parser = Parser::new();
//! let records = [
//!     BindingRecord::new(parser.parse_binding("10 / 2", "loc")?, "half", "1"),
//!     BindingRecord::new(parser.parse_interpolation("B{{a}}A", "loc")?, "text", "1"),
//! ];
//! let proto = ProtoChangeDetector::new("demo", Rc::new(PipeRegistry::default_pipes()), EvaluatorStrategy::Interpreted);
//! let log = Rc::new(RefCell::new(ChangeLog::default()));
//!
//! let mut tree = ChangeDetectorTree::new();
//! let id = tree.insert(proto.instantiate(Rc::clone(&log), &records, &[]));
//! tree.hydrate(id, Value::object(Rc::new(Record::new("Ctx").with_field("a", "value"))), None)?;
//! tree.detect_changes(id)?;
//!
//! assert_eq!(log.borrow_mut().take_values(), vec!["half=5", "text=BvalueA"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod detector;
mod dispatcher;
pub mod error;
mod lifecycle;
mod pipe;
pub mod pipes;
mod propagation;
mod proto;
mod registry;
mod tree;

#[cfg(test)]
mod testing;

pub use detector::{ChangeDetector, Mode};
pub use dispatcher::{ChangeDispatcher, ChangeLog, ChangeRecord, Notification, NullDispatcher, SlotValue};
pub use error::{BoxError, DetectorError, PipeError};
pub use lifecycle::LifeCycle;
pub use pipe::{Pipe, PipeFactory, Transformed};
pub use propagation::PropagationControl;
pub use proto::{BindingRecord, ProtoChangeDetector};
pub use registry::PipeRegistry;
pub use tree::{ChangeDetectorTree, DetectorId};
