//! Domain types for the dirtycheck engine.
//!
//! # Module Organization
//!
//! - [`value`] - the dynamic [`Value`] and its equality rules
//! - [`reflect`] - the [`Reflect`] capability and the [`Record`] field bag
//! - [`function`] - host closures callable from expressions
//! - [`ids`] - binding and group labels
//!
//! All public types are re-exported at this module level and at the crate
//! root:
//!
//! ```
//! use dc_core::{BindingId, GroupId, Record, Value};
//! ```

mod function;
mod ids;
mod reflect;
mod value;

pub use function::Function;
pub use ids::{BindingId, GroupId};
pub use reflect::{Record, Reflect};
pub use value::Value;
