//! The immutable expression tree.
//!
//! An [`Ast`] is built once per expression source and shared through
//! [`AstWithSource`] by every detector compiled from the same template.
//! `Display` unparses a tree into a fully parenthesised canonical form:
//!
//! ```
//! use dc_expr::Parser;
//!
//! let ast = Parser::new().parse_binding("a + b * c | fmt:1", "loc")?;
//! assert_eq!(ast.to_string(), "(a + (b * (c | fmt:1)))");
//! # Ok::<(), dc_expr::ParseError>(())
//! ```

use std::fmt;
use std::rc::Rc;

use dc_core::Value;

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `!x`
    Not,
    /// `-x`
    Neg,
    /// `+x`
    Plus,
}

impl UnaryOp {
    /// The operator as written in source.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
            Self::Plus => "+",
        }
    }
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`, numeric addition or string concatenation
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`, always produces a float
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `===`, same result as `==` since values never coerce
    StrictEq,
    /// `!==`
    StrictNe,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `&&`, short-circuiting
    And,
    /// `||`, short-circuiting
    Or,
}

impl BinaryOp {
    /// The operator as written in source.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// The detector context (or locals) a bare identifier is read from.
    ImplicitReceiver,
    /// A constant.
    Literal(Value),
    /// `receiver.name`, or a bare `name` on the implicit receiver.
    PropertyRead {
        /// The object read from.
        receiver: Box<Ast>,
        /// The field name.
        name: Rc<str>,
    },
    /// `receiver[key]`
    KeyedRead {
        /// The object read from.
        receiver: Box<Ast>,
        /// The key expression.
        key: Box<Ast>,
    },
    /// `receiver.name(args)`, or a bare `name(args)` on the implicit receiver.
    MethodCall {
        /// The object the method is called on.
        receiver: Box<Ast>,
        /// The method name.
        name: Rc<str>,
        /// Call arguments.
        args: Vec<Ast>,
    },
    /// `target(args)` where `target` is any expression other than a member.
    FunctionCall {
        /// Expression producing the function.
        target: Box<Ast>,
        /// Call arguments.
        args: Vec<Ast>,
    },
    /// A prefix operator application.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Ast>,
    },
    /// An infix operator application.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Ast>,
        /// Right operand.
        right: Box<Ast>,
    },
    /// `condition ? yes : no`
    Conditional {
        /// The test.
        condition: Box<Ast>,
        /// Value when truthy.
        yes: Box<Ast>,
        /// Value when falsy.
        no: Box<Ast>,
    },
    /// `[a, b, ...]`
    LiteralArray(Vec<Ast>),
    /// `{key: value, ...}`
    LiteralMap(Vec<(Rc<str>, Ast)>),
    /// `exp | name:arg:...`
    Pipe {
        /// The piped expression.
        exp: Box<Ast>,
        /// The registered pipe name.
        name: Rc<str>,
        /// Extra arguments.
        args: Vec<Ast>,
        /// Index of this application among the pipes of the expression,
        /// assigned in parse order.
        slot: usize,
    },
    /// Literal text interleaved with expressions. `strings` always has one
    /// more element than `expressions`.
    Interpolation {
        /// Literal text segments.
        strings: Vec<Rc<str>>,
        /// Embedded expressions.
        expressions: Vec<Ast>,
    },
}

impl Ast {
    /// Builds a bare identifier read.
    #[must_use]
    pub fn name(name: impl Into<Rc<str>>) -> Self {
        Self::PropertyRead {
            receiver: Box::new(Self::ImplicitReceiver),
            name: name.into(),
        }
    }

    /// Returns `true` if this is a constant.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Ast]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "{:?}", &**s),
        Value::Float(x) if x.is_finite() => write!(f, "{x:?}"),
        other => write!(f, "{other}"),
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImplicitReceiver => Ok(()),
            Self::Literal(value) => write_literal(f, value),
            Self::PropertyRead { receiver, name } => match **receiver {
                Self::ImplicitReceiver => f.write_str(name),
                _ => write!(f, "{receiver}.{name}"),
            },
            Self::KeyedRead { receiver, key } => write!(f, "{receiver}[{key}]"),
            Self::MethodCall {
                receiver,
                name,
                args,
            } => {
                match **receiver {
                    Self::ImplicitReceiver => write!(f, "{name}(")?,
                    _ => write!(f, "{receiver}.{name}(")?,
                }
                write_args(f, args)?;
                f.write_str(")")
            }
            Self::FunctionCall { target, args } => {
                write!(f, "{target}(")?;
                write_args(f, args)?;
                f.write_str(")")
            }
            Self::Unary { op, operand } => write!(f, "({}{operand})", op.symbol()),
            Self::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Self::Conditional { condition, yes, no } => write!(f, "({condition} ? {yes} : {no})"),
            Self::LiteralArray(items) => {
                f.write_str("[")?;
                write_args(f, items)?;
                f.write_str("]")
            }
            Self::LiteralMap(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_identifier(key) {
                        write!(f, "{key}: {value}")?;
                    } else {
                        write!(f, "{:?}: {value}", &**key)?;
                    }
                }
                f.write_str("}")
            }
            Self::Pipe {
                exp, name, args, ..
            } => {
                write!(f, "({exp} | {name}")?;
                for arg in args {
                    write!(f, ":{arg}")?;
                }
                f.write_str(")")
            }
            Self::Interpolation {
                strings,
                expressions,
            } => {
                for (i, text) in strings.iter().enumerate() {
                    f.write_str(text)?;
                    if let Some(exp) = expressions.get(i) {
                        write!(f, "{{{{{exp}}}}}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// A parsed expression together with the text it came from.
///
/// This is the unit the change detector holds per binding; error messages
/// name the binding as `'<source> in <location>'`.
#[derive(Debug, Clone, PartialEq)]
pub struct AstWithSource {
    ast: Ast,
    source: String,
    location: String,
    pipe_slots: usize,
}

impl AstWithSource {
    /// Wraps a tree. `pipe_slots` is the number of pipe applications in it.
    #[must_use]
    pub fn new(ast: Ast, source: impl Into<String>, location: impl Into<String>, pipe_slots: usize) -> Self {
        Self {
            ast,
            source: source.into(),
            location: location.into(),
            pipe_slots,
        }
    }

    /// The tree.
    #[inline]
    #[must_use]
    pub const fn ast(&self) -> &Ast {
        &self.ast
    }

    /// The original source text.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The location label given to the parser.
    #[inline]
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Number of pipe applications, and so of pipe slots a detector reserves.
    #[inline]
    #[must_use]
    pub const fn pipe_slots(&self) -> usize {
        self.pipe_slots
    }

    /// `"<source> in <location>"`, the form used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} in {}", self.source, self.location)
    }
}

impl fmt::Display for AstWithSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ast.fmt(f)
    }
}
