//! Expression evaluation.
//!
//! Two strategies implement [`Evaluator`] with identical observable
//! behaviour:
//!
//! - [`Interpreter`] walks the shared [`Ast`](crate::Ast) on every check
//! - [`Compiled`] lowers the tree once into nested closures, folding
//!   constant sub-expressions
//!
//! Pipe applications are delegated to a [`PipeHost`] owned by the caller
//! (the change detector), which keeps one pipe instance per slot.

mod compiled;
mod interpreter;
pub mod ops;

use std::rc::Rc;

use dc_core::{EvaluatorStrategy, Value};
use smallvec::SmallVec;

use crate::ast::AstWithSource;
use crate::error::EvalError;
use crate::locals::Locals;

pub use compiled::Compiled;
pub use interpreter::Interpreter;

/// Call arguments; most calls take a handful.
pub type Args = SmallVec<[Value; 4]>;

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// The detector context.
    pub context: &'a Value,
    /// The innermost locals frame, if any.
    pub locals: Option<&'a Locals>,
}

impl<'a> Scope<'a> {
    /// Creates a scope.
    #[must_use]
    pub const fn new(context: &'a Value, locals: Option<&'a Locals>) -> Self {
        Self { context, locals }
    }

    /// Resolves a bare identifier: locals first, then a context field.
    pub fn read_name(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.locals.and_then(|locals| locals.resolve(name)) {
            return Ok(value.clone());
        }
        Ok(self.context.read_field(name)?)
    }

    /// Calls a bare identifier: a function bound in locals, else a context
    /// method.
    pub fn call_name(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        if let Some(value) = self.locals.and_then(|locals| locals.resolve(name)) {
            return call_value(name, value, args);
        }
        Ok(self.context.invoke(name, args)?)
    }
}

/// Calls `target`, which must be a function. `name` only feeds the error.
pub fn call_value(name: &str, target: &Value, args: &[Value]) -> Result<Value, EvalError> {
    match target {
        Value::Function(f) => Ok(f.call(args)?),
        other => Err(dc_core::ValueError::NotCallable {
            name: name.to_owned(),
            kind: other.kind(),
        }
        .into()),
    }
}

/// Result of a pipe application reported by a [`PipeHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum PipeOutput {
    /// The pipe published a new value.
    Changed(Value),
    /// The pipe suppressed this check; carries the last published value.
    Unchanged(Value),
}

impl PipeOutput {
    /// The value to use when the pipe sits inside a larger expression.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Changed(value) | Self::Unchanged(value) => value,
        }
    }
}

/// Runs the pipe applications of an expression.
pub trait PipeHost {
    /// Applies pipe `name` in `slot` to `value`.
    fn apply_pipe(
        &mut self,
        slot: usize,
        name: &str,
        value: &Value,
        args: &[Value],
    ) -> Result<PipeOutput, EvalError>;
}

/// A host for expressions without pipes; any pipe application fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPipes;

impl PipeHost for NoPipes {
    fn apply_pipe(
        &mut self,
        _slot: usize,
        name: &str,
        _value: &Value,
        _args: &[Value],
    ) -> Result<PipeOutput, EvalError> {
        Err(EvalError::Pipe {
            name: name.to_owned(),
            message: "no pipe registry available".to_owned(),
        })
    }
}

/// Outcome of evaluating a binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    /// The binding's current value.
    Value(Value),
    /// The top-level pipe suppressed this check.
    NoChange,
}

/// Evaluates one binding expression.
pub trait Evaluator: std::fmt::Debug {
    /// The expression this evaluator runs.
    fn source(&self) -> &Rc<AstWithSource>;

    /// Evaluates against `scope`, routing pipe applications to `pipes`.
    fn evaluate(&self, scope: &Scope<'_>, pipes: &mut dyn PipeHost) -> Result<Evaluated, EvalError>;
}

/// Builds the evaluator for `strategy`.
///
/// # Examples
///
/// ```
/// use dc_core::{EvaluatorStrategy, Value};
/// use dc_expr::{evaluator, Evaluated, NoPipes, Parser, Scope};
///
/// let ast = Parser::new().parse_binding("10 / 2", "loc")?;
/// let eval = evaluator(EvaluatorStrategy::Compiled, ast);
/// let result = eval.evaluate(&Scope::new(&Value::Null, None), &mut NoPipes);
/// assert_eq!(result, Ok(Evaluated::Value(Value::Float(5.0))));
/// # Ok::<(), dc_expr::ParseError>(())
/// ```
#[must_use]
pub fn evaluator(strategy: EvaluatorStrategy, source: Rc<AstWithSource>) -> Box<dyn Evaluator> {
    match strategy {
        EvaluatorStrategy::Compiled => Box::new(Compiled::new(source)),
        _ => Box::new(Interpreter::new(source)),
    }
}
