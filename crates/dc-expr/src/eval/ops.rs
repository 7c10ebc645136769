//! Operator semantics shared by both evaluator strategies.

use dc_core::Value;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::EvalError;

fn invalid(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::InvalidOperands {
        op: op.symbol(),
        left: left.kind(),
        right: right.kind(),
    }
}

/// Applies a prefix operator.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => Ok(i
            .checked_neg()
            .map_or_else(|| Value::Float(-(*i as f64)), Value::Int)),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Plus, value @ (Value::Int(_) | Value::Float(_))) => Ok(value.clone()),
        (op, value) => Err(EvalError::InvalidOperand {
            op: op.symbol(),
            operand: value.kind(),
        }),
    }
}

/// Applies an integer operation, widening to float on overflow.
fn arithmetic(
    left: &Value,
    right: &Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Option<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(
            int(*a, *b).map_or_else(|| Value::Float(float(*a as f64, *b as f64)), Value::Int),
        ),
        _ => Some(Value::Float(float(left.as_f64()?, right.as_f64()?))),
    }
}

/// Applies an eager infix operator.
///
/// `&&` and `||` short-circuit and are evaluated by the strategies directly;
/// passed here they combine the truthiness of two already evaluated operands.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) => {
            Some(Value::from(format!("{left}{right}")))
        }
        BinaryOp::Add => arithmetic(left, right, i64::checked_add, |a, b| a + b),
        BinaryOp::Sub => arithmetic(left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Some(Value::Float(a / b)),
            _ => None,
        },
        BinaryOp::Rem => match (left, right) {
            (Value::Int(_), Value::Int(0)) => Some(Value::Float(f64::NAN)),
            _ => arithmetic(left, right, i64::checked_rem, |a, b| a % b),
        },
        BinaryOp::Eq | BinaryOp::StrictEq => Some(Value::Bool(left == right)),
        BinaryOp::Ne | BinaryOp::StrictNe => Some(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => compare(op, left, right),
        BinaryOp::And => Some(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Some(Value::Bool(left.is_truthy() || right.is_truthy())),
    };
    result.ok_or_else(|| invalid(op, left, right))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => {
            let (a, b) = (left.as_f64()?, right.as_f64()?);
            // NaN compares false under every relational operator
            match a.partial_cmp(&b) {
                Some(ordering) => Some(ordering),
                None => return Some(Value::Bool(false)),
            }
        }
    }?;
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Le => ordering.is_le(),
        _ => ordering.is_ge(),
    };
    Some(Value::Bool(result))
}
