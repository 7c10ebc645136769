//! Error types for the dc-core crate.
//!
//! This module provides [`ValueError`], raised when a value is used in a way
//! its shape does not allow (reading an unknown field, calling a non-function),
//! and [`ConfigError`] for configuration and scenario loading failures.

use camino::Utf8PathBuf;

/// Errors raised while reading from or calling into a [`Value`](crate::Value).
///
/// These are the failures a host context can produce. The expression
/// evaluator wraps them together with the binding location before they reach
/// the caller of a change detection pass.
///
/// # Examples
///
/// ```
/// use dc_core::ValueError;
///
/// let error = ValueError::UnknownField {
///     type_name: "Person".to_owned(),
///     name: "nickname".to_owned(),
/// };
/// assert_eq!(error.to_string(), "cannot read field 'nickname' of Person");
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The object has no field with the given name.
    #[error("cannot read field '{name}' of {type_name}")]
    UnknownField {
        /// The reflected type name of the object.
        type_name: String,
        /// The requested field.
        name: String,
    },

    /// A call was attempted on something that is not a function.
    #[error("'{name}' is not a function (found {kind})")]
    NotCallable {
        /// The name the call was made through.
        name: String,
        /// The kind of value found instead.
        kind: &'static str,
    },

    /// A host function received the wrong number of arguments.
    #[error("expected {expected} argument(s), got {found}")]
    Arity {
        /// Number of arguments the function accepts.
        expected: usize,
        /// Number of arguments supplied.
        found: usize,
    },

    /// A host function failed.
    #[error("{0}")]
    Host(String),
}

impl ValueError {
    /// Creates a [`ValueError::Host`] error from any message.
    #[inline]
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }
}

/// Errors that can occur while loading configuration or scenario files.
///
/// # Examples
///
/// ```
/// use dc_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::MissingFile(Utf8PathBuf::from("scenario.json"));
/// assert!(error.to_string().contains("scenario.json"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("missing configuration file: {0}")]
    MissingFile(Utf8PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
