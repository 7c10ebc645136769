//! Closure-tree evaluator.
//!
//! The expression tree is lowered once, when a detector is instantiated, into
//! nested boxed closures. Sub-expressions made only of constants are folded
//! during lowering; folding never changes results because operators are pure
//! and a fold that would fail is left to fail at evaluation time.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use dc_core::Value;

use super::{call_value, ops, Args, Evaluated, Evaluator, PipeHost, PipeOutput, Scope};
use crate::ast::{Ast, AstWithSource, BinaryOp};
use crate::error::EvalError;

type Node = Box<dyn Fn(&Scope<'_>, &mut dyn PipeHost) -> Result<Value, EvalError>>;

fn node<F>(f: F) -> Node
where
    F: Fn(&Scope<'_>, &mut dyn PipeHost) -> Result<Value, EvalError> + 'static,
{
    Box::new(f)
}

/// A lowered sub-expression: either a folded constant or code to run.
enum Lowered {
    Const(Value),
    Code(Node),
}

impl Lowered {
    fn into_node(self) -> Node {
        match self {
            Self::Const(value) => node(move |_, _| Ok(value.clone())),
            Self::Code(code) => code,
        }
    }

    fn as_const(&self) -> Option<&Value> {
        match self {
            Self::Const(value) => Some(value),
            Self::Code(_) => None,
        }
    }
}

fn run_all(nodes: &[Node], scope: &Scope<'_>, pipes: &mut dyn PipeHost) -> Result<Args, EvalError> {
    let mut args = Args::with_capacity(nodes.len());
    for node in nodes {
        args.push(node(scope, &mut *pipes)?);
    }
    Ok(args)
}

fn lower_all(asts: &[Ast]) -> Vec<Lowered> {
    asts.iter().map(lower).collect()
}

fn into_nodes(lowered: Vec<Lowered>) -> Vec<Node> {
    lowered.into_iter().map(Lowered::into_node).collect()
}

/// Folds `value` if the operation succeeds on constants, else emits `code`.
fn fold_or(folded: Option<Result<Value, EvalError>>, code: impl FnOnce() -> Node) -> Lowered {
    match folded {
        Some(Ok(value)) => Lowered::Const(value),
        _ => Lowered::Code(code()),
    }
}

fn lower(ast: &Ast) -> Lowered {
    match ast {
        Ast::Literal(value) => Lowered::Const(value.clone()),
        Ast::ImplicitReceiver => Lowered::Code(node(|scope, _| Ok(scope.context.clone()))),
        Ast::PropertyRead { receiver, name } => {
            let name = Rc::clone(name);
            if matches!(**receiver, Ast::ImplicitReceiver) {
                return Lowered::Code(node(move |scope, _| scope.read_name(&name)));
            }
            let receiver = lower(receiver).into_node();
            Lowered::Code(node(move |scope, pipes| {
                Ok(receiver(scope, pipes)?.read_field(&name)?)
            }))
        }
        Ast::KeyedRead { receiver, key } => {
            let receiver = lower(receiver).into_node();
            let key = lower(key).into_node();
            Lowered::Code(node(move |scope, pipes| {
                let receiver = receiver(scope, &mut *pipes)?;
                let key = key(scope, &mut *pipes)?;
                Ok(receiver.read_keyed(&key)?)
            }))
        }
        Ast::MethodCall {
            receiver,
            name,
            args,
        } => {
            let name = Rc::clone(name);
            let args = into_nodes(lower_all(args));
            if matches!(**receiver, Ast::ImplicitReceiver) {
                return Lowered::Code(node(move |scope, pipes| {
                    let args = run_all(&args, scope, pipes)?;
                    scope.call_name(&name, &args)
                }));
            }
            let receiver = lower(receiver).into_node();
            Lowered::Code(node(move |scope, pipes| {
                let receiver = receiver(scope, &mut *pipes)?;
                let args = run_all(&args, scope, pipes)?;
                Ok(receiver.invoke(&name, &args)?)
            }))
        }
        Ast::FunctionCall { target, args } => {
            let label = target.to_string();
            let target = lower(target).into_node();
            let args = into_nodes(lower_all(args));
            Lowered::Code(node(move |scope, pipes| {
                let function = target(scope, &mut *pipes)?;
                let args = run_all(&args, scope, pipes)?;
                call_value(&label, &function, &args)
            }))
        }
        Ast::Unary { op, operand } => {
            let op = *op;
            let operand = lower(operand);
            let folded = operand.as_const().map(|value| ops::unary(op, value));
            fold_or(folded, || {
                let operand = operand.into_node();
                node(move |scope, pipes| ops::unary(op, &operand(scope, pipes)?))
            })
        }
        Ast::Binary { op, left, right } => lower_binary(*op, lower(left), lower(right)),
        Ast::Conditional { condition, yes, no } => match lower(condition) {
            Lowered::Const(condition) if condition.is_truthy() => lower(yes),
            Lowered::Const(_) => lower(no),
            Lowered::Code(condition) => {
                let yes = lower(yes).into_node();
                let no = lower(no).into_node();
                Lowered::Code(node(move |scope, pipes| {
                    if condition(scope, &mut *pipes)?.is_truthy() {
                        yes(scope, pipes)
                    } else {
                        no(scope, pipes)
                    }
                }))
            }
        },
        Ast::LiteralArray(items) => {
            let items = lower_all(items);
            if let Some(values) = items.iter().map(Lowered::as_const).collect::<Option<Vec<_>>>() {
                return Lowered::Const(values.into_iter().cloned().collect::<Vec<_>>().into());
            }
            let items = into_nodes(items);
            Lowered::Code(node(move |scope, pipes| {
                Ok(run_all(&items, scope, pipes)?.into_vec().into())
            }))
        }
        Ast::LiteralMap(entries) => {
            let keys: Vec<String> = entries.iter().map(|(key, _)| key.to_string()).collect();
            let values: Vec<Lowered> = entries.iter().map(|(_, value)| lower(value)).collect();
            if values.iter().all(|value| value.as_const().is_some()) {
                let map: BTreeMap<String, Value> = keys
                    .into_iter()
                    .zip(values.iter().filter_map(Lowered::as_const).cloned())
                    .collect();
                return Lowered::Const(map.into());
            }
            let values = into_nodes(values);
            Lowered::Code(node(move |scope, pipes| {
                let values = run_all(&values, scope, pipes)?;
                Ok(keys
                    .iter()
                    .cloned()
                    .zip(values)
                    .collect::<BTreeMap<_, _>>()
                    .into())
            }))
        }
        Ast::Pipe {
            exp,
            name,
            args,
            slot,
        } => {
            let (exp, args, name, slot) = lower_pipe(exp, args, name, *slot);
            Lowered::Code(node(move |scope, pipes| {
                let value = exp(scope, &mut *pipes)?;
                let args = run_all(&args, scope, &mut *pipes)?;
                Ok(pipes.apply_pipe(slot, &name, &value, &args)?.into_value())
            }))
        }
        Ast::Interpolation {
            strings,
            expressions,
        } => {
            let strings = strings.clone();
            let expressions = into_nodes(lower_all(expressions));
            Lowered::Code(node(move |scope, pipes| {
                let mut out = String::new();
                for (i, text) in strings.iter().enumerate() {
                    out.push_str(text);
                    if let Some(exp) = expressions.get(i) {
                        out.push_str(&exp(scope, &mut *pipes)?.to_string());
                    }
                }
                Ok(Value::from(out))
            }))
        }
    }
}

fn lower_binary(op: BinaryOp, left: Lowered, right: Lowered) -> Lowered {
    let folded = match (left.as_const(), right.as_const()) {
        (Some(l), Some(r)) => Some(ops::binary(op, l, r)),
        _ => None,
    };
    fold_or(folded, || {
        let left = left.into_node();
        let right = right.into_node();
        match op {
            BinaryOp::And => node(move |scope, pipes| {
                Ok(Value::Bool(
                    left(scope, &mut *pipes)?.is_truthy() && right(scope, pipes)?.is_truthy(),
                ))
            }),
            BinaryOp::Or => node(move |scope, pipes| {
                Ok(Value::Bool(
                    left(scope, &mut *pipes)?.is_truthy() || right(scope, pipes)?.is_truthy(),
                ))
            }),
            op => node(move |scope, pipes| {
                let left = left(scope, &mut *pipes)?;
                let right = right(scope, pipes)?;
                ops::binary(op, &left, &right)
            }),
        }
    })
}

fn lower_pipe(exp: &Ast, args: &[Ast], name: &Rc<str>, slot: usize) -> (Node, Vec<Node>, Rc<str>, usize) {
    (
        lower(exp).into_node(),
        into_nodes(lower_all(args)),
        Rc::clone(name),
        slot,
    )
}

/// Top-level shape of a lowered binding. A pipe at the root can suppress the
/// whole check, so it is kept apart.
enum Root {
    Value(Node),
    Pipe {
        exp: Node,
        args: Vec<Node>,
        name: Rc<str>,
        slot: usize,
    },
}

/// Evaluator running a closure tree lowered from the expression once.
pub struct Compiled {
    source: Rc<AstWithSource>,
    root: Root,
}

impl Compiled {
    /// Lowers `source`.
    #[must_use]
    pub fn new(source: Rc<AstWithSource>) -> Self {
        let root = match source.ast() {
            Ast::Pipe {
                exp,
                name,
                args,
                slot,
            } => {
                let (exp, args, name, slot) = lower_pipe(exp, args, name, *slot);
                Root::Pipe {
                    exp,
                    args,
                    name,
                    slot,
                }
            }
            ast => Root::Value(lower(ast).into_node()),
        };
        Self { source, root }
    }
}

impl fmt::Debug for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiled")
            .field("source", &self.source.source())
            .finish_non_exhaustive()
    }
}

impl Evaluator for Compiled {
    fn source(&self) -> &Rc<AstWithSource> {
        &self.source
    }

    fn evaluate(&self, scope: &Scope<'_>, pipes: &mut dyn PipeHost) -> Result<Evaluated, EvalError> {
        match &self.root {
            Root::Value(code) => code(scope, pipes).map(Evaluated::Value),
            Root::Pipe {
                exp,
                args,
                name,
                slot,
            } => {
                let value = exp(scope, &mut *pipes)?;
                let args = run_all(args, scope, &mut *pipes)?;
                match pipes.apply_pipe(*slot, name, &value, &args)? {
                    PipeOutput::Changed(value) => Ok(Evaluated::Value(value)),
                    PipeOutput::Unchanged(_) => Ok(Evaluated::NoChange),
                }
            }
        }
    }
}
