use std::collections::BTreeMap;
use std::rc::Rc;

use dc_core::Value;

use super::{call_value, ops, Args, Evaluated, Evaluator, PipeHost, PipeOutput, Scope};
use crate::ast::{Ast, AstWithSource, BinaryOp};
use crate::error::EvalError;

/// Tree-walking evaluator over the shared expression tree.
#[derive(Debug)]
pub struct Interpreter {
    source: Rc<AstWithSource>,
}

impl Interpreter {
    /// Creates an interpreter for `source`.
    #[must_use]
    pub const fn new(source: Rc<AstWithSource>) -> Self {
        Self { source }
    }
}

impl Evaluator for Interpreter {
    fn source(&self) -> &Rc<AstWithSource> {
        &self.source
    }

    fn evaluate(&self, scope: &Scope<'_>, pipes: &mut dyn PipeHost) -> Result<Evaluated, EvalError> {
        match self.source.ast() {
            Ast::Pipe {
                exp,
                name,
                args,
                slot,
            } => {
                let value = eval(exp, scope, pipes)?;
                let args = eval_args(args, scope, pipes)?;
                match pipes.apply_pipe(*slot, name, &value, &args)? {
                    PipeOutput::Changed(value) => Ok(Evaluated::Value(value)),
                    PipeOutput::Unchanged(_) => Ok(Evaluated::NoChange),
                }
            }
            ast => eval(ast, scope, pipes).map(Evaluated::Value),
        }
    }
}

fn eval_args(args: &[Ast], scope: &Scope<'_>, pipes: &mut dyn PipeHost) -> Result<Args, EvalError> {
    args.iter().map(|arg| eval(arg, scope, pipes)).collect()
}

fn eval(ast: &Ast, scope: &Scope<'_>, pipes: &mut dyn PipeHost) -> Result<Value, EvalError> {
    match ast {
        Ast::ImplicitReceiver => Ok(scope.context.clone()),
        Ast::Literal(value) => Ok(value.clone()),
        Ast::PropertyRead { receiver, name } => match **receiver {
            Ast::ImplicitReceiver => scope.read_name(name),
            _ => Ok(eval(receiver, scope, pipes)?.read_field(name)?),
        },
        Ast::KeyedRead { receiver, key } => {
            let receiver = eval(receiver, scope, pipes)?;
            let key = eval(key, scope, pipes)?;
            Ok(receiver.read_keyed(&key)?)
        }
        Ast::MethodCall {
            receiver,
            name,
            args,
        } => match **receiver {
            Ast::ImplicitReceiver => {
                let args = eval_args(args, scope, pipes)?;
                scope.call_name(name, &args)
            }
            _ => {
                let receiver = eval(receiver, scope, pipes)?;
                let args = eval_args(args, scope, pipes)?;
                Ok(receiver.invoke(name, &args)?)
            }
        },
        Ast::FunctionCall { target, args } => {
            let function = eval(target, scope, pipes)?;
            let args = eval_args(args, scope, pipes)?;
            call_value(&target.to_string(), &function, &args)
        }
        Ast::Unary { op, operand } => ops::unary(*op, &eval(operand, scope, pipes)?),
        Ast::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => Ok(Value::Bool(
            eval(left, scope, pipes)?.is_truthy() && eval(right, scope, pipes)?.is_truthy(),
        )),
        Ast::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => Ok(Value::Bool(
            eval(left, scope, pipes)?.is_truthy() || eval(right, scope, pipes)?.is_truthy(),
        )),
        Ast::Binary { op, left, right } => {
            let left = eval(left, scope, pipes)?;
            let right = eval(right, scope, pipes)?;
            ops::binary(*op, &left, &right)
        }
        Ast::Conditional { condition, yes, no } => {
            if eval(condition, scope, pipes)?.is_truthy() {
                eval(yes, scope, pipes)
            } else {
                eval(no, scope, pipes)
            }
        }
        Ast::LiteralArray(items) => Ok(items
            .iter()
            .map(|item| eval(item, scope, pipes))
            .collect::<Result<Vec<_>, _>>()?
            .into()),
        Ast::LiteralMap(entries) => Ok(entries
            .iter()
            .map(|(key, value)| Ok::<_, EvalError>((key.to_string(), eval(value, scope, pipes)?)))
            .collect::<Result<BTreeMap<_, _>, _>>()?
            .into()),
        Ast::Pipe {
            exp,
            name,
            args,
            slot,
        } => {
            let value = eval(exp, scope, pipes)?;
            let args = eval_args(args, scope, pipes)?;
            Ok(pipes.apply_pipe(*slot, name, &value, &args)?.into_value())
        }
        Ast::Interpolation {
            strings,
            expressions,
        } => {
            let mut out = String::new();
            for (i, text) in strings.iter().enumerate() {
                out.push_str(text);
                if let Some(exp) = expressions.get(i) {
                    out.push_str(&eval(exp, scope, pipes)?.to_string());
                }
            }
            Ok(Value::from(out))
        }
    }
}
