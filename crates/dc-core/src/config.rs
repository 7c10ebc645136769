//! Configuration structures for the dirtycheck engine.
//!
//! - [`EvaluatorStrategy`] - how binding expressions are evaluated
//! - [`EngineConfig`] - root configuration shared by the library and the CLI
//!
//! All configuration types implement [`Default`] and deserialize with missing
//! fields filled from the defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How binding expressions are evaluated by a change detector.
///
/// Both strategies are observably identical; they differ only in the amount
/// of work done per check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EvaluatorStrategy {
    /// Walk the shared expression tree on every check.
    #[default]
    Interpreted,
    /// Lower each expression once into a tree of closures at instantiation.
    Compiled,
}

impl EvaluatorStrategy {
    /// Returns a short label for logs and CLI output.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Interpreted => "interpreted",
            Self::Compiled => "compiled",
        }
    }
}

/// Root configuration for the engine.
///
/// # Examples
///
/// ```
/// use dc_core::{EngineConfig, EvaluatorStrategy};
///
/// let config = EngineConfig::from_json_str(r#"{"strategy": "compiled"}"#)?;
/// assert_eq!(config.strategy, EvaluatorStrategy::Compiled);
/// assert!(!config.enforce_no_new_changes);
/// # Ok::<(), dc_core::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluator strategy used when building proto change detectors.
    pub strategy: EvaluatorStrategy,

    /// Run a verification pass after every tick and fail on any value that
    /// changed during it.
    pub enforce_no_new_changes: bool,
}

impl EngineConfig {
    /// Parses a configuration from JSON, filling absent fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.strategy, EvaluatorStrategy::Interpreted);
        assert!(!config.enforce_no_new_changes);
    }

    #[test]
    fn test_engine_config_serialization() {
        let config = EngineConfig {
            strategy: EvaluatorStrategy::Compiled,
            enforce_no_new_changes: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_engine_config_missing_fields() {
        let config = EngineConfig::from_json_str(r#"{"enforce_no_new_changes": true}"#).unwrap();
        assert!(config.enforce_no_new_changes);
        assert_eq!(config.strategy, EvaluatorStrategy::Interpreted);
    }

    #[test]
    fn test_engine_config_rejects_unknown_strategy() {
        let result = EngineConfig::from_json_str(r#"{"strategy": "jit"}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_strategy_serialization() {
        assert_eq!(
            serde_json::to_string(&EvaluatorStrategy::Interpreted).unwrap(),
            r#""interpreted""#
        );
        assert_eq!(
            serde_json::to_string(&EvaluatorStrategy::Compiled).unwrap(),
            r#""compiled""#
        );
        assert_eq!(EvaluatorStrategy::Compiled.label(), "compiled");
    }
}
