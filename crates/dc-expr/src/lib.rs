//! Binding expression compiler for the dirtycheck engine.
//!
//! This crate turns expression source into an immutable, shareable tree and
//! evaluates it against a context value:
//!
//! - [`lexer`] - logos-based tokenizer
//! - [`Parser`] - recursive descent parser for bindings and `{{ }}`
//!   interpolations, with a per-parser tree cache
//! - [`Ast`] / [`AstWithSource`] - the expression tree
//! - [`Locals`] - chained scopes for template-local variables
//! - [`eval`] - the interpreted and compiled [`Evaluator`] strategies
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//! use dc_core::{EvaluatorStrategy, Record, Value};
//! use dc_expr::{evaluator, Evaluated, NoPipes, Parser, Scope};
//!
//! let mut parser = Parser::new();
//! let ast = parser.parse_interpolation("B{{a}}A", "Comp")?;
//!
//! let context = Value::object(Rc::new(Record::new("Comp").with_field("a", "value")));
//! let result = evaluator(EvaluatorStrategy::Interpreted, ast)
//!     .evaluate(&Scope::new(&context, None), &mut NoPipes);
//! assert_eq!(result, Ok(Evaluated::Value(Value::from("BvalueA"))));
//! # Ok::<(), dc_expr::ParseError>(())
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
mod locals;
mod parser;

pub use ast::{Ast, AstWithSource, BinaryOp, UnaryOp};
pub use error::{EvalError, ParseError};
pub use eval::{
    evaluator, Compiled, Evaluated, Evaluator, Interpreter, NoPipes, PipeHost, PipeOutput, Scope,
};
pub use locals::Locals;
pub use parser::{parse_binding, parse_interpolation, Parser};
