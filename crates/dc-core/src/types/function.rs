//! Host functions exposed to expressions.

use std::fmt;
use std::rc::Rc;

use crate::error::ValueError;
use crate::types::Value;

type HostFn = dyn Fn(&[Value]) -> Result<Value, ValueError>;

/// A reference-counted host closure.
///
/// Functions compare by identity: two clones of the same `Function` are
/// equal, two separately created functions never are.
///
/// # Examples
///
/// ```
/// use dc_core::{Function, Value};
///
/// let greet = Function::new(|args| Ok(Value::from(format!("Hi, {}", args[0]))));
/// assert_eq!(greet.call(&[Value::from("Jim")])?, Value::from("Hi, Jim"));
/// # Ok::<(), dc_core::ValueError>(())
/// ```
#[derive(Clone)]
pub struct Function(Rc<HostFn>);

impl Function {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ValueError> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Wraps a closure that takes no arguments and cannot fail.
    pub fn thunk<F>(f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        Self::new(move |args| {
            if args.is_empty() {
                Ok(f())
            } else {
                Err(ValueError::Arity {
                    expected: 0,
                    found: args.len(),
                })
            }
        })
    }

    /// Invokes the function.
    #[inline]
    pub fn call(&self, args: &[Value]) -> Result<Value, ValueError> {
        (self.0)(args)
    }

    /// Returns `true` if both handles point at the same closure.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function(..)")
    }
}
