use std::collections::BTreeMap;
use std::rc::Rc;

use dc_core::Value;

use super::entry;
use crate::error::PipeError;
use crate::pipe::{Pipe, PipeFactory, Transformed};

/// Factory for [`KeyValueChangesPipe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueChangesFactory;

impl PipeFactory for KeyValueChangesFactory {
    fn supports(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    fn create(&self) -> Box<dyn Pipe> {
        Box::new(KeyValueChangesPipe::default())
    }
}

/// Diffs successive maps.
///
/// Publishes a map with the current `map` and three lists, each in key order:
/// `additions` (`{key, currentValue}`), `removals` (`{key, previousValue}`)
/// and `changes` (`{key, previousValue, currentValue}`).
#[derive(Debug, Default)]
pub struct KeyValueChangesPipe {
    previous: Option<Rc<BTreeMap<String, Value>>>,
}

impl Pipe for KeyValueChangesPipe {
    fn supports(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    fn transform(&mut self, value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
        let Value::Map(current) = value else {
            return Err(PipeError::transform(
                "keyValDiff",
                format!("expected a map, found {}", value.kind()),
            ));
        };
        let first = self.previous.is_none();
        let previous = self.previous.replace(Rc::clone(current)).unwrap_or_default();

        let mut additions = Vec::new();
        let mut changes = Vec::new();
        for (key, value) in current.iter() {
            match previous.get(key) {
                None => additions.push(entry([
                    ("key", key.as_str().into()),
                    ("currentValue", value.clone()),
                ])),
                Some(old) if !old.loose_identical(value) => changes.push(entry([
                    ("key", key.as_str().into()),
                    ("previousValue", old.clone()),
                    ("currentValue", value.clone()),
                ])),
                Some(_) => {}
            }
        }
        let removals: Vec<Value> = previous
            .iter()
            .filter(|(key, _)| !current.contains_key(*key))
            .map(|(key, old)| entry([("key", key.as_str().into()), ("previousValue", old.clone())]))
            .collect();

        if !first && additions.is_empty() && removals.is_empty() && changes.is_empty() {
            return Ok(Transformed::NoChange);
        }
        Ok(Transformed::Value(entry([
            ("map", value.clone()),
            ("additions", additions.into()),
            ("removals", removals.into()),
            ("changes", changes.into()),
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, i64)]) -> Value {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), Value::Int(*value)))
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    #[test]
    fn test_reports_additions_removals_and_changes() {
        let mut pipe = KeyValueChangesFactory.create();
        let Ok(Transformed::Value(first)) = pipe.transform(&map(&[("a", 1), ("b", 2)]), &[]) else {
            panic!("first transform must publish");
        };
        assert_eq!(first.read_field("additions").unwrap().as_list().unwrap().len(), 2);

        let Ok(Transformed::Value(second)) = pipe.transform(&map(&[("a", 1), ("b", 3), ("c", 4)]), &[])
        else {
            panic!("second transform must publish");
        };
        assert_eq!(
            second.read_field("changes").unwrap().to_string(),
            "{currentValue: 3, key: b, previousValue: 2}"
        );
        assert_eq!(
            second.read_field("additions").unwrap().to_string(),
            "{currentValue: 4, key: c}"
        );

        let Ok(Transformed::Value(third)) = pipe.transform(&map(&[("c", 4)]), &[]) else {
            panic!("third transform must publish");
        };
        assert_eq!(third.read_field("removals").unwrap().as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_equal_map_is_no_change() {
        let mut pipe = KeyValueChangesPipe::default();
        pipe.transform(&map(&[("a", 1)]), &[]).unwrap();
        assert_eq!(pipe.transform(&map(&[("a", 1)]), &[]), Ok(Transformed::NoChange));
        assert!(pipe.transform(&Value::Null, &[]).is_err());
    }
}
