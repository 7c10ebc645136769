//! Core types, errors, and configuration for the dirtycheck engine.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`Value`] - the dynamic value every expression evaluates to
//! - [`Reflect`] - the capability interface for reading fields off opaque
//!   context objects, plus [`Record`], a ready-made implementation
//! - [`Function`] - host closures callable from expressions
//! - [`BindingId`] and [`GroupId`] - labels attached to watched expressions
//! - [`EngineConfig`] - engine settings shared by the library and the CLI
//! - Error types ([`ValueError`], [`ConfigError`])
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)
//!
//! # Examples
//!
//! ```
//! use dc_core::{Record, Reflect, Value};
//!
//! let person = Record::new("Person").with_field("name", "misko");
//! assert_eq!(person.read_field("name"), Ok(Value::from("misko")));
//!
//! person.set("name", "Misko");
//! assert_eq!(person.get("name").map(|v| v.to_string()), Some("Misko".to_owned()));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineConfig, EvaluatorStrategy};
pub use error::{ConfigError, ValueError};
pub use types::{BindingId, Function, GroupId, Record, Reflect, Value};

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
///
/// Used for the small name-keyed tables of the engine (record fields, locals
/// frames, pipe registrations). Not DoS resistant; keys are never untrusted.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// The hasher used by [`FxHashMap`] and [`FxHashSet`].
pub type FxBuildHasher = rustc_hash::FxBuildHasher;
