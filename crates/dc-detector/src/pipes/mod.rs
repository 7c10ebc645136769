//! Built-in pipes registered by [`PipeRegistry::default_pipes`](crate::PipeRegistry::default_pipes).
//!
//! - [`NullPipe`] - publishes `null` once for a missing collection
//! - [`IterableChangesPipe`] - reports additions, removals and moves in lists
//! - [`KeyValueChangesPipe`] - reports additions, removals and changes in maps

mod iterable;
mod keyvalue;
mod null;

use std::collections::BTreeMap;

use dc_core::Value;

pub use iterable::{IterableChangesFactory, IterableChangesPipe};
pub use keyvalue::{KeyValueChangesFactory, KeyValueChangesPipe};
pub use null::{NullPipe, NullPipeFactory};

/// Builds a map value from `(key, value)` pairs.
fn entry<const N: usize>(pairs: [(&str, Value); N]) -> Value {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect::<BTreeMap<_, _>>()
        .into()
}
