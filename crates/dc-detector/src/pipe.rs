//! The pipe capability: stateful, swappable value transforms.

use dc_core::Value;

use crate::error::PipeError;

/// Result of [`Pipe::transform`].
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// Publish this value.
    Value(Value),
    /// Suppress this check and keep the previously published value.
    NoChange,
}

impl From<Value> for Transformed {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// A stateful transform applied to a binding's value before dirty checking.
///
/// A pipe instance is owned by exactly one pipe slot of one detector. When
/// the value it is fed stops being supported, the detector calls
/// [`on_destroy`](Self::on_destroy) and selects a replacement through the
/// [`PipeRegistry`](crate::PipeRegistry).
pub trait Pipe: std::fmt::Debug {
    /// Returns `true` if this pipe can keep transforming `value`.
    fn supports(&self, value: &Value) -> bool;

    /// Transforms `value`. `args` are the evaluated `:`-separated arguments.
    fn transform(&mut self, value: &Value, args: &[Value]) -> Result<Transformed, PipeError>;

    /// Called once when the pipe is discarded.
    fn on_destroy(&mut self) {}
}

/// Creates pipe instances for one registration of a pipe name.
pub trait PipeFactory: std::fmt::Debug {
    /// Returns `true` if pipes from this factory support `value`.
    fn supports(&self, value: &Value) -> bool;

    /// Creates a fresh pipe.
    fn create(&self) -> Box<dyn Pipe>;
}
