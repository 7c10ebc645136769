//! Error types for the dc-expr crate.
//!
//! - [`ParseError`] - malformed expression source, raised at compile time
//! - [`EvalError`] - failure while evaluating an expression against a context

use dc_core::ValueError;

/// Errors raised while lexing or parsing expression source.
///
/// Every variant carries the full input and the caller-supplied location
/// label so the message alone pinpoints the offending template binding.
/// Parse errors are never retried; the template that produced them is
/// unusable.
///
/// # Examples
///
/// ```
/// use dc_expr::Parser;
///
/// let err = Parser::new().parse_binding("a +", "Person.name").unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "Parser Error: unexpected end of expression, expected an expression in [a +] in Person.name"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The lexer found text that is not a token.
    #[error("Parser Error: invalid token '{token}' at column {column} in [{input}] in {location}")]
    InvalidToken {
        /// The offending text.
        token: String,
        /// Byte offset into the input.
        column: usize,
        /// The full input.
        input: String,
        /// The location label.
        location: String,
    },

    /// A token appeared where the grammar expected something else.
    #[error(
        "Parser Error: unexpected token '{found}', expected {expected} at column {column} in [{input}] in {location}"
    )]
    UnexpectedToken {
        /// The token found.
        found: String,
        /// Description of what the grammar expected.
        expected: String,
        /// Byte offset into the input.
        column: usize,
        /// The full input.
        input: String,
        /// The location label.
        location: String,
    },

    /// The input ended in the middle of an expression.
    #[error("Parser Error: unexpected end of expression, expected {expected} in [{input}] in {location}")]
    UnexpectedEnd {
        /// Description of what the grammar expected.
        expected: String,
        /// The full input.
        input: String,
        /// The location label.
        location: String,
    },

    /// An interpolation opened with `{{` was never closed.
    #[error(
        "Parser Error: missing '}}}}' for interpolation opened at column {column} in [{input}] in {location}"
    )]
    UnterminatedInterpolation {
        /// Byte offset of the opening braces.
        column: usize,
        /// The full input.
        input: String,
        /// The location label.
        location: String,
    },

    /// The expression (or an interpolation segment) contains no tokens.
    #[error("Parser Error: blank expression at column {column} in [{input}] in {location}")]
    EmptyExpression {
        /// Byte offset where an expression was expected.
        column: usize,
        /// The full input.
        input: String,
        /// The location label.
        location: String,
    },
}

impl ParseError {
    /// Returns the input that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        match self {
            Self::InvalidToken { input, .. }
            | Self::UnexpectedToken { input, .. }
            | Self::UnexpectedEnd { input, .. }
            | Self::UnterminatedInterpolation { input, .. }
            | Self::EmptyExpression { input, .. } => input,
        }
    }

    /// Returns the location label supplied by the caller.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::InvalidToken { location, .. }
            | Self::UnexpectedToken { location, .. }
            | Self::UnexpectedEnd { location, .. }
            | Self::UnterminatedInterpolation { location, .. }
            | Self::EmptyExpression { location, .. } => location,
        }
    }

    /// Returns the byte offset of the failure, when known.
    #[must_use]
    pub const fn column(&self) -> Option<usize> {
        match self {
            Self::InvalidToken { column, .. }
            | Self::UnexpectedToken { column, .. }
            | Self::UnterminatedInterpolation { column, .. }
            | Self::EmptyExpression { column, .. } => Some(*column),
            Self::UnexpectedEnd { .. } => None,
        }
    }
}

/// Errors raised while evaluating an expression.
///
/// The change detector wraps these with the binding's source text and
/// location before surfacing them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Reading or calling into a value failed.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// A binary operator received operands it is not defined for.
    #[error("cannot apply '{op}' to {left} and {right}")]
    InvalidOperands {
        /// The operator symbol.
        op: &'static str,
        /// Kind of the left operand.
        left: &'static str,
        /// Kind of the right operand.
        right: &'static str,
    },

    /// A unary operator received an operand it is not defined for.
    #[error("cannot apply unary '{op}' to {operand}")]
    InvalidOperand {
        /// The operator symbol.
        op: &'static str,
        /// Kind of the operand.
        operand: &'static str,
    },

    /// A pipe could not be selected or failed to transform.
    #[error("pipe '{name}': {message}")]
    Pipe {
        /// The pipe name as written in the expression.
        name: String,
        /// What went wrong.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_accessors() {
        let err = ParseError::UnexpectedToken {
            found: ")".to_owned(),
            expected: "an expression".to_owned(),
            column: 2,
            input: "a )".to_owned(),
            location: "loc".to_owned(),
        };
        assert_eq!(err.input(), "a )");
        assert_eq!(err.location(), "loc");
        assert_eq!(err.column(), Some(2));
    }

    #[test]
    fn test_unterminated_display_escapes_braces() {
        let err = ParseError::UnterminatedInterpolation {
            column: 1,
            input: "a{{b".to_owned(),
            location: "loc".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Parser Error: missing '}}' for interpolation opened at column 1 in [a{{b] in loc"
        );
    }

    #[test]
    fn test_eval_error_wraps_value_error() {
        let err = EvalError::from(ValueError::host("boom"));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_invalid_operands_display() {
        let err = EvalError::InvalidOperands {
            op: "-",
            left: "string",
            right: "list",
        };
        assert_eq!(err.to_string(), "cannot apply '-' to string and list");
    }
}
