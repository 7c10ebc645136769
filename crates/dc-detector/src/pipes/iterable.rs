use std::rc::Rc;

use dc_core::Value;

use super::entry;
use crate::error::PipeError;
use crate::pipe::{Pipe, PipeFactory, Transformed};

/// Factory for [`IterableChangesPipe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IterableChangesFactory;

impl PipeFactory for IterableChangesFactory {
    fn supports(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }

    fn create(&self) -> Box<dyn Pipe> {
        Box::new(IterableChangesPipe::default())
    }
}

/// Diffs successive lists.
///
/// Publishes a map with the current `collection` and three lists:
///
/// - `additions` - `{item, currentIndex}` for items with no match in the
///   previous list
/// - `removals` - `{item, previousIndex}` for previous items left unmatched
/// - `moves` - `{item, previousIndex, currentIndex}` for matched items whose
///   index changed
///
/// Items are matched in order against the first unmatched identical item of
/// the previous list. The first transform reports every item as added; later
/// transforms over an identical list report no change.
#[derive(Debug, Default)]
pub struct IterableChangesPipe {
    previous: Option<Rc<[Value]>>,
}

impl Pipe for IterableChangesPipe {
    fn supports(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }

    fn transform(&mut self, value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
        let Value::List(current) = value else {
            return Err(PipeError::transform(
                "iterableDiff",
                format!("expected a list, found {}", value.kind()),
            ));
        };
        let first = self.previous.is_none();
        let previous = self.previous.replace(Rc::clone(current));
        let previous: &[Value] = previous.as_deref().unwrap_or_default();

        let mut matched = vec![false; previous.len()];
        let mut additions = Vec::new();
        let mut moves = Vec::new();
        for (index, item) in current.iter().enumerate() {
            let found = (0..previous.len())
                .find(|&i| !matched[i] && previous[i].loose_identical(item));
            match found {
                Some(previous_index) => {
                    matched[previous_index] = true;
                    if previous_index != index {
                        moves.push(entry([
                            ("item", item.clone()),
                            ("previousIndex", previous_index.into()),
                            ("currentIndex", index.into()),
                        ]));
                    }
                }
                None => additions.push(entry([("item", item.clone()), ("currentIndex", index.into())])),
            }
        }
        let removals: Vec<Value> = previous
            .iter()
            .zip(&matched)
            .enumerate()
            .filter(|(_, (_, matched))| !**matched)
            .map(|(index, (item, _))| entry([("item", item.clone()), ("previousIndex", index.into())]))
            .collect();

        if !first && additions.is_empty() && removals.is_empty() && moves.is_empty() {
            return Ok(Transformed::NoChange);
        }
        Ok(Transformed::Value(entry([
            ("collection", value.clone()),
            ("additions", additions.into()),
            ("removals", removals.into()),
            ("moves", moves.into()),
        ])))
    }
}
