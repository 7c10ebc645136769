//! Name-keyed pipe factory registry.
//!
//! A [`PipeRegistry`] maps each pipe name to an ordered list of factories.
//! Selection returns a pipe from the first factory that supports the value;
//! registration order is fixed once the registry is built.

use dc_core::{FxHashMap, Value};
use tracing::trace;

use crate::error::PipeError;
use crate::pipe::{Pipe, PipeFactory};
use crate::pipes::{IterableChangesFactory, KeyValueChangesFactory, NullPipeFactory};

/// Registry of pipe factories, keyed by pipe name.
///
/// # Examples
///
/// ```
/// use dc_core::Value;
/// use dc_detector::PipeRegistry;
///
/// let registry = PipeRegistry::default_pipes();
/// assert!(registry.select("iterableDiff", &Value::from(vec![Value::Int(1)])).is_ok());
/// assert!(registry.select("iterableDiff", &Value::Int(1)).is_err());
/// assert!(registry.select("missing", &Value::Null).is_err());
/// ```
#[derive(Debug, Default)]
pub struct PipeRegistry {
    factories: FxHashMap<String, Vec<Box<dyn PipeFactory>>>,
}

impl PipeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `factory` to the registrations for `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, factory: impl PipeFactory + 'static) -> Self {
        self.factories
            .entry(name.into())
            .or_default()
            .push(Box::new(factory));
        self
    }

    /// The registry with the built-in pipes:
    ///
    /// - `iterableDiff` - [`IterableChangesFactory`], then [`NullPipeFactory`]
    /// - `keyValDiff` - [`KeyValueChangesFactory`], then [`NullPipeFactory`]
    #[must_use]
    pub fn default_pipes() -> Self {
        Self::new()
            .with("iterableDiff", IterableChangesFactory)
            .with("iterableDiff", NullPipeFactory)
            .with("keyValDiff", KeyValueChangesFactory)
            .with("keyValDiff", NullPipeFactory)
    }

    /// Creates a pipe named `name` that supports `value`.
    pub fn select(&self, name: &str, value: &Value) -> Result<Box<dyn Pipe>, PipeError> {
        let factories = self.factories.get(name).ok_or_else(|| PipeError::NotFound {
            name: name.to_owned(),
        })?;
        let (index, factory) = factories
            .iter()
            .enumerate()
            .find(|(_, factory)| factory.supports(value))
            .ok_or_else(|| PipeError::Unsupported {
                name: name.to_owned(),
                kind: value.kind(),
            })?;
        trace!(pipe = name, factory = index, kind = value.kind(), "selected pipe");
        Ok(factory.create())
    }

    /// Returns `true` if any factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered pipe names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::Transformed;

    #[derive(Debug)]
    struct Tagged(&'static str, fn(&Value) -> bool);

    #[derive(Debug)]
    struct TaggedPipe(&'static str);

    impl Pipe for TaggedPipe {
        fn supports(&self, _value: &Value) -> bool {
            true
        }

        fn transform(&mut self, _value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
            Ok(Value::from(self.0).into())
        }
    }

    impl PipeFactory for Tagged {
        fn supports(&self, value: &Value) -> bool {
            (self.1)(value)
        }

        fn create(&self) -> Box<dyn Pipe> {
            Box::new(TaggedPipe(self.0))
        }
    }

    fn tag_of(registry: &PipeRegistry, value: &Value) -> Value {
        match registry.select("p", value).unwrap().transform(value, &[]).unwrap() {
            Transformed::Value(value) => value,
            Transformed::NoChange => Value::Null,
        }
    }

    #[test]
    fn test_first_supporting_factory_wins() {
        let registry = PipeRegistry::new()
            .with("p", Tagged("numbers", Value::is_number))
            .with("p", Tagged("anything", |_| true))
            .with("p", Tagged("never", |_| true));

        assert_eq!(tag_of(&registry, &Value::Int(1)), Value::from("numbers"));
        assert_eq!(tag_of(&registry, &Value::from("x")), Value::from("anything"));
    }

    #[test]
    fn test_missing_name_and_unsupported_value() {
        let registry = PipeRegistry::new().with("p", Tagged("numbers", Value::is_number));

        assert_eq!(
            registry.select("q", &Value::Int(1)).unwrap_err(),
            PipeError::NotFound {
                name: "q".to_owned()
            }
        );
        assert_eq!(
            registry.select("p", &Value::from("x")).unwrap_err(),
            PipeError::Unsupported {
                name: "p".to_owned(),
                kind: "string"
            }
        );
    }

    #[test]
    fn test_default_pipes() {
        let registry = PipeRegistry::default_pipes();
        assert_eq!(registry.names(), vec!["iterableDiff", "keyValDiff"]);
        assert!(registry.contains("keyValDiff"));
        assert!(registry.select("keyValDiff", &Value::Null).is_ok());
        assert!(registry.select("keyValDiff", &Value::from(Vec::<Value>::new())).is_err());
    }
}
