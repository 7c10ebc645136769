//! Error types for the dc-detector crate.
//!
//! - [`PipeError`] - pipe lookup and transform failures
//! - [`DetectorError`] - everything a check pass or a tree operation can fail
//!   with

use dc_core::{BindingId, GroupId};
use dc_expr::EvalError;

use crate::dispatcher::SlotValue;
use crate::tree::DetectorId;

/// Boxed error returned by dispatchers and host callbacks.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Errors raised by the pipe registry and by pipe instances.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipeError {
    /// No factories are registered under the name.
    #[error("cannot find pipe '{name}'")]
    NotFound {
        /// The requested pipe name.
        name: String,
    },

    /// Factories exist for the name but none supports the value.
    #[error("cannot find a pipe '{name}' supporting {kind}")]
    Unsupported {
        /// The requested pipe name.
        name: String,
        /// The kind of the value that no factory accepted.
        kind: &'static str,
    },

    /// A pipe failed while transforming a value.
    #[error("pipe '{name}' failed: {message}")]
    Transform {
        /// The pipe that failed.
        name: String,
        /// What went wrong.
        message: String,
    },
}

impl PipeError {
    /// Creates a [`PipeError::Transform`] error.
    #[inline]
    pub fn transform(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the pipe name this error is about.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::NotFound { name } | Self::Unsupported { name, .. } | Self::Transform { name, .. } => {
                name
            }
        }
    }
}

/// Errors raised by change detection passes and tree operations.
///
/// # Error Recovery Strategy
///
/// - **Pass errors** ([`Evaluation`](Self::Evaluation),
///   [`ChangedAfterChecked`](Self::ChangedAfterChecked),
///   [`Dispatch`](Self::Dispatch)): the pass stops at the failing record.
///   Records already processed keep their new cached values.
/// - **Tree errors**: the tree is left unchanged.
///
/// # Examples
///
/// ```
/// use dc_detector::{DetectorError, SlotValue};
/// use dc_core::Value;
///
/// let error = DetectorError::ChangedAfterChecked {
///     expression: "a in location".to_owned(),
///     binding_id: "a".into(),
///     previous: SlotValue::Uninitialized,
///     current: Value::Int(1),
/// };
/// assert!(error.to_string().starts_with("Expression 'a in location' has changed after it was checked"));
/// assert!(error.is_strict_mode_violation());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// Evaluating a binding failed.
    #[error("{source} in [{expression}]")]
    Evaluation {
        /// Source text and location label of the expression.
        expression: String,
        /// The binding being evaluated.
        binding_id: BindingId,
        /// The underlying evaluation failure.
        #[source]
        source: EvalError,
    },

    /// A strict verification pass saw a value that differs from the cache.
    #[error(
        "Expression '{expression}' has changed after it was checked. \
         Previous value: '{previous}'. Current value: '{current}'"
    )]
    ChangedAfterChecked {
        /// Source text and location label of the expression.
        expression: String,
        /// The binding that changed.
        binding_id: BindingId,
        /// The cached value.
        previous: SlotValue,
        /// The freshly evaluated value.
        current: dc_core::Value,
    },

    /// The dispatcher failed while handling a group.
    #[error("dispatcher failed for group '{group}': {source}")]
    Dispatch {
        /// The group being flushed.
        group: GroupId,
        /// The dispatcher's error.
        #[source]
        source: BoxError,
    },

    /// The handle does not name a live detector.
    #[error("unknown change detector {0}")]
    UnknownDetector(DetectorId),

    /// Attaching would make a detector its own ancestor.
    #[error("cannot add {child} under {parent}: it would create a cycle")]
    WouldCreateCycle {
        /// The intended parent.
        parent: DetectorId,
        /// The intended child.
        child: DetectorId,
    },

    /// The detector already has a parent.
    #[error("{child} is already a child of {parent}")]
    AlreadyAttached {
        /// The detector's current parent.
        parent: DetectorId,
        /// The detector being attached.
        child: DetectorId,
    },

    /// The detector is not a child of the given parent.
    #[error("{child} is not a child of {parent}")]
    NotAChild {
        /// The parent searched.
        parent: DetectorId,
        /// The detector that was not found.
        child: DetectorId,
    },
}

impl DetectorError {
    /// Creates a [`DetectorError::Dispatch`] error.
    #[inline]
    pub fn dispatch(group: GroupId, source: impl Into<BoxError>) -> Self {
        Self::Dispatch {
            group,
            source: source.into(),
        }
    }

    /// Returns `true` for errors raised by a strict verification pass.
    #[inline]
    #[must_use]
    pub const fn is_strict_mode_violation(&self) -> bool {
        matches!(self, Self::ChangedAfterChecked { .. })
    }

    /// Returns `true` if this error aborted a change detection pass.
    #[inline]
    #[must_use]
    pub const fn is_pass_error(&self) -> bool {
        matches!(
            self,
            Self::Evaluation { .. } | Self::ChangedAfterChecked { .. } | Self::Dispatch { .. }
        )
    }

    /// Returns the binding this error is about, if any.
    #[must_use]
    pub const fn binding_id(&self) -> Option<&BindingId> {
        match self {
            Self::Evaluation { binding_id, .. } | Self::ChangedAfterChecked { binding_id, .. } => {
                Some(binding_id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_error_display() {
        let err = PipeError::NotFound {
            name: "upper".to_owned(),
        };
        assert_eq!(err.to_string(), "cannot find pipe 'upper'");
        assert_eq!(err.name(), "upper");

        let err = PipeError::Unsupported {
            name: "iterableDiff".to_owned(),
            kind: "int",
        };
        assert_eq!(err.to_string(), "cannot find a pipe 'iterableDiff' supporting int");

        let err = PipeError::transform("counting", "overflow");
        assert_eq!(err.to_string(), "pipe 'counting' failed: overflow");
    }

    #[test]
    fn test_evaluation_error_names_expression() {
        let err = DetectorError::Evaluation {
            expression: "nickname in Person".to_owned(),
            binding_id: "nick".into(),
            source: EvalError::Value(dc_core::ValueError::UnknownField {
                type_name: "Person".to_owned(),
                name: "nickname".to_owned(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "cannot read field 'nickname' of Person in [nickname in Person]"
        );
        assert!(err.is_pass_error());
        assert!(!err.is_strict_mode_violation());
        assert_eq!(err.binding_id().map(BindingId::as_str), Some("nick"));
    }

    #[test]
    fn test_dispatch_error_keeps_source() {
        let err = DetectorError::dispatch("g1".into(), "listener failed");
        assert!(err.to_string().contains("g1"));
        assert!(err.to_string().contains("listener failed"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.binding_id().is_none());
    }
}
