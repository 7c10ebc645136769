use dc_core::Value;

use crate::error::PipeError;
use crate::pipe::{Pipe, PipeFactory, Transformed};

/// Factory for [`NullPipe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPipeFactory;

impl PipeFactory for NullPipeFactory {
    fn supports(&self, value: &Value) -> bool {
        value.is_null()
    }

    fn create(&self) -> Box<dyn Pipe> {
        Box::new(NullPipe::default())
    }
}

/// Publishes `null` on its first transform and suppresses every later check.
#[derive(Debug, Default)]
pub struct NullPipe {
    called: bool,
}

impl Pipe for NullPipe {
    fn supports(&self, value: &Value) -> bool {
        value.is_null()
    }

    fn transform(&mut self, _value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
        if self.called {
            return Ok(Transformed::NoChange);
        }
        self.called = true;
        Ok(Transformed::Value(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publishes_null_once() {
        let mut pipe = NullPipeFactory.create();
        assert!(pipe.supports(&Value::Null));
        assert!(!pipe.supports(&Value::Int(0)));
        assert_eq!(pipe.transform(&Value::Null, &[]), Ok(Transformed::Value(Value::Null)));
        assert_eq!(pipe.transform(&Value::Null, &[]), Ok(Transformed::NoChange));
    }
}
