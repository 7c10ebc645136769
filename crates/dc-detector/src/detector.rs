//! Change detector instances.
//!
//! A [`ChangeDetector`] holds the per-instance state of one node of the
//! detector tree: the watch list with its cached values and pipe slots, the
//! hydrated context and locals, the dispatcher, and the [`Mode`]. Tree
//! structure and traversal live in [`ChangeDetectorTree`](crate::ChangeDetectorTree).

use std::fmt;
use std::mem;
use std::rc::Rc;

use dc_core::{BindingId, GroupId, Value};
use dc_expr::{EvalError, Evaluated, Evaluator, Locals, PipeHost, PipeOutput, Scope};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::dispatcher::{ChangeDispatcher, ChangeRecord, SlotValue};
use crate::error::{DetectorError, PipeError};
use crate::pipe::{Pipe, Transformed};
use crate::registry::PipeRegistry;

/// Activation mode of a detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Checked on every pass.
    #[default]
    CheckAlways,
    /// Checked on the next pass, then becomes [`Mode::Checked`].
    CheckOnce,
    /// Skipped with its subtree until reset.
    Checked,
    /// Skipped with its subtree; stops upward re-check requests.
    Detached,
}

impl Mode {
    /// Returns `true` if a pass skips this node and its subtree.
    #[inline]
    #[must_use]
    pub const fn is_skipped(self) -> bool {
        matches!(self, Self::Checked | Self::Detached)
    }

    /// Returns a short label for logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CheckAlways => "check_always",
            Self::CheckOnce => "check_once",
            Self::Checked => "checked",
            Self::Detached => "detached",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default)]
struct PipeSlot {
    pipe: Option<Box<dyn Pipe>>,
    last: Value,
}

#[derive(Debug)]
struct Binding {
    id: BindingId,
    group: GroupId,
    evaluator: Box<dyn Evaluator>,
    previous: SlotValue,
    pipes: Vec<PipeSlot>,
}

impl Binding {
    fn destroy_pipes(&mut self) -> usize {
        let mut destroyed = 0;
        for slot in &mut self.pipes {
            if let Some(mut pipe) = slot.pipe.take() {
                pipe.on_destroy();
                destroyed += 1;
            }
            slot.last = Value::Null;
        }
        destroyed
    }
}

/// Routes the pipe applications of one binding to its pipe slots.
struct SlotHost<'a> {
    registry: &'a PipeRegistry,
    slots: &'a mut [PipeSlot],
}

impl PipeHost for SlotHost<'_> {
    fn apply_pipe(
        &mut self,
        slot: usize,
        name: &str,
        value: &Value,
        args: &[Value],
    ) -> Result<PipeOutput, EvalError> {
        let pipe_error = |err: PipeError| EvalError::Pipe {
            name: name.to_owned(),
            message: err.to_string(),
        };
        let Some(state) = self.slots.get_mut(slot) else {
            return Err(EvalError::Pipe {
                name: name.to_owned(),
                message: format!("no pipe slot {slot}"),
            });
        };
        let pipe = match state.pipe.take() {
            Some(pipe) if pipe.supports(value) => pipe,
            stale => {
                if let Some(mut old) = stale {
                    debug!(pipe = name, slot, kind = value.kind(), "destroying pipe that no longer supports its value");
                    old.on_destroy();
                }
                self.registry.select(name, value).map_err(pipe_error)?
            }
        };
        let pipe = state.pipe.insert(pipe);
        match pipe.transform(value, args).map_err(pipe_error)? {
            Transformed::Value(value) => {
                state.last = value.clone();
                Ok(PipeOutput::Changed(value))
            }
            Transformed::NoChange => Ok(PipeOutput::Unchanged(state.last.clone())),
        }
    }
}

type ChangeBuffer = SmallVec<[ChangeRecord; 4]>;

/// One node's watch list and runtime state.
///
/// Built by [`ProtoChangeDetector::instantiate`](crate::ProtoChangeDetector::instantiate)
/// and driven through a [`ChangeDetectorTree`](crate::ChangeDetectorTree).
pub struct ChangeDetector {
    name: Rc<str>,
    registry: Rc<PipeRegistry>,
    dispatcher: Box<dyn ChangeDispatcher>,
    bindings: Vec<Binding>,
    local_names: Rc<[String]>,
    context: Option<Value>,
    locals: Option<Rc<Locals>>,
    mode: Mode,
}

impl ChangeDetector {
    pub(crate) fn new(
        name: Rc<str>,
        registry: Rc<PipeRegistry>,
        dispatcher: Box<dyn ChangeDispatcher>,
        bindings: Vec<(BindingId, GroupId, Box<dyn Evaluator>)>,
        local_names: Rc<[String]>,
    ) -> Self {
        let bindings = bindings
            .into_iter()
            .map(|(id, group, evaluator)| {
                let pipes = (0..evaluator.source().pipe_slots())
                    .map(|_| PipeSlot::default())
                    .collect();
                Binding {
                    id,
                    group,
                    evaluator,
                    previous: SlotValue::Uninitialized,
                    pipes,
                }
            })
            .collect();
        Self {
            name,
            registry,
            dispatcher,
            bindings,
            local_names,
            context: None,
            locals: None,
            mode: Mode::CheckAlways,
        }
    }

    /// The name of the proto detector this was built from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Sets the mode.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Number of watched bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The template-local variable names this detector was built with.
    #[must_use]
    pub fn local_names(&self) -> &[String] {
        &self.local_names
    }

    /// The bound context, if hydrated.
    #[must_use]
    pub const fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// The cached value of the binding at `index`.
    #[must_use]
    pub fn previous_value(&self, index: usize) -> Option<&SlotValue> {
        self.bindings.get(index).map(|binding| &binding.previous)
    }

    /// Returns `true` while a context is bound.
    #[must_use]
    pub const fn hydrated(&self) -> bool {
        self.context.is_some()
    }

    /// Binds `context` and `locals`, enabling evaluation.
    pub fn hydrate(&mut self, context: Value, locals: Option<Rc<Locals>>) {
        for name in &*self.local_names {
            if !locals.as_ref().is_some_and(|locals| locals.declares(name)) {
                warn!(detector = %self.name, local = %name, "declared local is not bound");
            }
        }
        debug!(detector = %self.name, context = context.kind(), "hydrated");
        self.context = Some(context);
        self.locals = locals;
    }

    /// Destroys every live pipe, resets cached values and unbinds the
    /// context and locals.
    pub fn dehydrate(&mut self) {
        let destroyed: usize = self.bindings.iter_mut().map(Binding::destroy_pipes).sum();
        for binding in &mut self.bindings {
            binding.previous = SlotValue::Uninitialized;
        }
        self.context = None;
        self.locals = None;
        debug!(detector = %self.name, pipes_destroyed = destroyed, "dehydrated");
    }

    /// Evaluates this node's own records in order, dispatching changed groups.
    ///
    /// With `throw_on_change`, the first changed record fails the pass with
    /// [`DetectorError::ChangedAfterChecked`] instead of being recorded.
    /// Returns the number of changed records.
    pub(crate) fn check_records(&mut self, throw_on_change: bool) -> Result<usize, DetectorError> {
        let Self {
            name,
            registry,
            dispatcher,
            bindings,
            context,
            locals,
            ..
        } = self;
        let Some(context) = context.as_ref() else {
            trace!(detector = %name, "not hydrated, skipping records");
            return Ok(0);
        };
        let scope = Scope::new(context, locals.as_deref());

        let mut buffer = ChangeBuffer::new();
        let mut buffer_group: Option<GroupId> = None;
        let mut changed = 0;
        for binding in bindings.iter_mut() {
            if buffer_group.as_ref().is_some_and(|group| *group != binding.group) {
                flush(dispatcher.as_mut(), &mut buffer_group, &mut buffer)?;
            }

            let mut host = SlotHost {
                registry: &**registry,
                slots: &mut binding.pipes,
            };
            let evaluated = binding
                .evaluator
                .evaluate(&scope, &mut host)
                .map_err(|source| DetectorError::Evaluation {
                    expression: binding.evaluator.source().describe(),
                    binding_id: binding.id.clone(),
                    source,
                })?;
            let Evaluated::Value(current) = evaluated else {
                continue;
            };
            if !binding.previous.differs_from(&current) {
                continue;
            }
            if throw_on_change {
                let expression = binding.evaluator.source().describe();
                debug!(detector = %name, binding = %binding.id, %expression, "value changed after it was checked");
                return Err(DetectorError::ChangedAfterChecked {
                    expression,
                    binding_id: binding.id.clone(),
                    previous: binding.previous.clone(),
                    current,
                });
            }

            let previous = mem::replace(&mut binding.previous, SlotValue::Set(current.clone()));
            buffer.push(ChangeRecord {
                binding_id: binding.id.clone(),
                previous_value: previous,
                current_value: current,
            });
            buffer_group.get_or_insert_with(|| binding.group.clone());
            changed += 1;
        }
        flush(dispatcher.as_mut(), &mut buffer_group, &mut buffer)?;
        trace!(detector = %name, changed, "checked records");
        Ok(changed)
    }
}

fn flush(
    dispatcher: &mut dyn ChangeDispatcher,
    group: &mut Option<GroupId>,
    buffer: &mut ChangeBuffer,
) -> Result<(), DetectorError> {
    let Some(group) = group.take() else {
        return Ok(());
    };
    trace!(group = %group, changes = buffer.len(), "flushing change group");
    let result = dispatcher.on_record_change(&group, buffer);
    buffer.clear();
    result.map_err(|source| DetectorError::dispatch(group, source))
}

impl fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("hydrated", &self.hydrated())
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        for binding in &mut self.bindings {
            binding.destroy_pipes();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use dc_core::{EvaluatorStrategy, Function, Record, Value};
    use dc_expr::{Locals, Parser};

    use super::*;
    use crate::proto::{BindingRecord, ProtoChangeDetector};
    use crate::testing::{
        once_factory, records, CountingFactory, CountingPipe, EventDispatcher, FailingDispatcher, Fixture,
        IdentityPipe, JoinPipe, STRATEGIES, traced_factory,
    };
    use crate::tree::ChangeDetectorTree;

    fn person(name: &str) -> Rc<Record> {
        Rc::new(Record::new("Person").with_field("name", name))
    }

    fn registry_with(name: &str, factory: impl crate::PipeFactory + 'static) -> PipeRegistry {
        PipeRegistry::new().with(name, factory)
    }

    #[test]
    fn test_simple_watching() {
        for strategy in STRATEGIES {
            let person = person("misko");
            let mut fx = Fixture::watching(strategy, &["name"]);
            fx.hydrate(&person);

            assert_eq!(fx.detect(), vec!["name=misko"]);
            assert!(fx.detect().is_empty());
            person.set("name", "Misko");
            assert_eq!(fx.detect(), vec!["name=Misko"]);
        }
    }

    #[test]
    fn test_first_pass_reports_null() {
        for strategy in STRATEGIES {
            let context = Rc::new(Record::new("Ctx").with_field("a", Value::Null));
            let mut fx = Fixture::watching(strategy, &["a"]);
            fx.hydrate(&context);

            let notifications = {
                fx.tree.detect_changes(fx.id).unwrap();
                fx.log.borrow_mut().take()
            };
            assert_eq!(notifications.len(), 1);
            let change = &notifications[0].changes[0];
            assert_eq!(change.previous_value, SlotValue::Uninitialized);
            assert_eq!(change.current_value, Value::Null);
            assert!(fx.detect().is_empty());
        }
    }

    #[test]
    fn test_nan_is_not_a_change() {
        for strategy in STRATEGIES {
            let context = Rc::new(Record::new("Ctx").with_field("a", f64::NAN));
            let mut fx = Fixture::watching(strategy, &["a"]);
            fx.hydrate(&context);

            assert_eq!(fx.detect(), vec!["a=NaN"]);
            assert!(fx.detect().is_empty());
        }
    }

    #[test]
    fn test_division_reports_a_float() {
        for strategy in STRATEGIES {
            let mut fx = Fixture::watching(strategy, &["10 / 2"]);
            fx.hydrate(&Rc::new(Record::new("Ctx")));
            assert_eq!(fx.detect(), vec!["10 / 2=5"]);

            let detector = fx.tree.get(fx.id).unwrap();
            assert!(matches!(
                detector.previous_value(0),
                Some(SlotValue::Set(Value::Float(x))) if *x == 5.0
            ));
        }
    }

    #[test]
    fn test_interpolation() {
        for strategy in STRATEGIES {
            let ast = Parser::new().parse_interpolation("B{{a}}A", "location").unwrap();
            let log = Rc::new(RefCell::new(crate::ChangeLog::default()));
            let proto = ProtoChangeDetector::new("test", Rc::new(PipeRegistry::new()), strategy);
            let mut tree = ChangeDetectorTree::new();
            let id = tree.insert(proto.instantiate(Rc::clone(&log), &[BindingRecord::new(ast, "text", "1")], &[]));
            let context = Rc::new(Record::new("Ctx").with_field("a", "value"));
            tree.hydrate(id, Value::object(context), None).unwrap();

            tree.detect_changes(id).unwrap();
            assert_eq!(log.borrow_mut().take_values(), vec!["text=BvalueA"]);
        }
    }

    #[test]
    fn test_literal_containers_compare_structurally() {
        for strategy in STRATEGIES {
            let context = Rc::new(Record::new("Ctx").with_field("a", 1));
            let mut fx = Fixture::watching(strategy, &["[a, 2]", "{z: a}"]);
            fx.hydrate(&context);

            assert_eq!(fx.detect().len(), 2);
            assert!(fx.detect().is_empty());
            context.set("a", 3);
            assert_eq!(fx.detect(), vec!["[a, 2]=3,2", "{z: a}={z: 3}"]);
        }
    }

    #[test]
    fn test_changes_are_grouped() {
        for strategy in STRATEGIES {
            let mut fx = Fixture::new(
                strategy,
                PipeRegistry::new(),
                &[("1 + 2", "1"), ("10 + 20", "1"), ("100 + 200", "2")],
            );
            fx.hydrate(&Rc::new(Record::new("Ctx")));
            fx.tree.detect_changes(fx.id).unwrap();

            let groups: Vec<(String, Vec<String>)> = fx
                .log
                .borrow_mut()
                .take()
                .iter()
                .map(|notification| {
                    (
                        notification.group.to_string(),
                        notification
                            .changes
                            .iter()
                            .map(|change| change.current_value.to_string())
                            .collect(),
                    )
                })
                .collect();
            assert_eq!(
                groups,
                vec![
                    ("1".to_owned(), vec!["3".to_owned(), "30".to_owned()]),
                    ("2".to_owned(), vec!["300".to_owned()]),
                ]
            );
        }
    }

    fn invoker(events: &Rc<RefCell<Vec<String>>>, label: &'static str) -> Function {
        let events = Rc::clone(events);
        Function::new(move |_| {
            events.borrow_mut().push(format!("Invoke{label}"));
            Ok(Value::from(label))
        })
    }

    #[test]
    fn test_group_is_flushed_before_next_group_evaluates() {
        for strategy in STRATEGIES {
            let events = Rc::new(RefCell::new(Vec::new()));
            let context = Record::new("Ctx")
                .with_field("a", invoker(&events, "A"))
                .with_field("b", invoker(&events, "B"))
                .with_field("c", invoker(&events, "C"));
            let proto = ProtoChangeDetector::new("test", Rc::new(PipeRegistry::new()), strategy);
            let records = records(&[("a()", "1"), ("b()", "2"), ("c()", "2")]);
            let mut tree = ChangeDetectorTree::new();
            let id = tree.insert(proto.instantiate(EventDispatcher(Rc::clone(&events)), &records, &[]));
            tree.hydrate(id, Value::object(Rc::new(context)), None).unwrap();

            tree.detect_changes(id).unwrap();
            assert_eq!(
                *events.borrow(),
                vec!["InvokeA", "a()", "InvokeB", "InvokeC", "b(),c()"]
            );
        }
    }

    #[test]
    fn test_evaluation_error_aborts_the_pass() {
        for strategy in STRATEGIES {
            let mut fx = Fixture::new(
                strategy,
                PipeRegistry::new(),
                &[("name", "1"), ("nickname", "2"), ("name.length", "3")],
            );
            fx.hydrate(&person("misko"));

            let err = fx.tree.detect_changes(fx.id).unwrap_err();
            assert!(matches!(&err, DetectorError::Evaluation { expression, .. } if expression == "nickname in location"));
            assert_eq!(err.binding_id().map(BindingId::as_str), Some("nickname"));
            assert_eq!(fx.log.borrow_mut().take_values(), vec!["name=misko"]);

            let detector = fx.tree.get(fx.id).unwrap();
            assert_eq!(detector.previous_value(2), Some(&SlotValue::Uninitialized));
        }
    }

    #[test]
    fn test_check_no_changes() {
        for strategy in STRATEGIES {
            let context = Rc::new(Record::new("Ctx").with_field("a", 1));
            let mut fx = Fixture::watching(strategy, &["a"]);
            fx.hydrate(&context);

            let err = fx.tree.check_no_changes(fx.id).unwrap_err();
            assert!(err.is_strict_mode_violation());
            assert!(
                err.to_string()
                    .starts_with("Expression 'a in location' has changed after it was checked"),
                "{err}"
            );

            fx.tree.detect_changes(fx.id).unwrap();
            fx.log.borrow_mut().take();
            fx.tree.check_no_changes(fx.id).unwrap();

            context.set("a", 2);
            let err = fx.tree.check_no_changes(fx.id).unwrap_err();
            assert_eq!(err.binding_id().map(BindingId::as_str), Some("a"));
            assert!(fx.log.borrow().is_empty());
            let detector = fx.tree.get(fx.id).unwrap();
            assert_eq!(detector.previous_value(0), Some(&SlotValue::Set(Value::Int(1))));
        }
    }

    #[test]
    fn test_dispatcher_error_propagates() {
        let proto = ProtoChangeDetector::new("test", Rc::new(PipeRegistry::new()), EvaluatorStrategy::Interpreted);
        let mut tree = ChangeDetectorTree::new();
        let id = tree.insert(proto.instantiate(FailingDispatcher, &records(&[("1", "g")]), &[]));
        tree.hydrate(id, Value::Null, None).unwrap();

        let err = tree.detect_changes(id).unwrap_err();
        assert!(matches!(&err, DetectorError::Dispatch { group, .. } if group.as_str() == "g"));
        assert!(err.to_string().contains("dispatcher exploded"));
    }

    fn with_locals(strategy: EvaluatorStrategy, expression: &str, locals: Locals) -> Vec<String> {
        let log = Rc::new(RefCell::new(crate::ChangeLog::default()));
        let proto = ProtoChangeDetector::new("test", Rc::new(PipeRegistry::new()), strategy);
        let mut tree = ChangeDetectorTree::new();
        let detector = proto.instantiate(Rc::clone(&log), &records(&[(expression, "1")]), &["key".to_owned()]);
        assert_eq!(detector.local_names(), ["key".to_owned()]);
        let id = tree.insert(detector);
        tree.hydrate(id, Value::object(person("misko")), Some(Rc::new(locals)))
            .unwrap();
        tree.detect_changes(id).unwrap();
        let values = log.borrow_mut().take_values();
        values
    }

    #[test]
    fn test_reads_and_calls_locals() {
        for strategy in STRATEGIES {
            assert_eq!(
                with_locals(strategy, "key", Locals::root().with_binding("key", "value")),
                vec!["key=value"]
            );
            assert_eq!(
                with_locals(
                    strategy,
                    "key()",
                    Locals::root().with_binding("key", Function::thunk(|| Value::from("value")))
                ),
                vec!["key()=value"]
            );
        }
    }

    #[test]
    fn test_nested_locals_and_context_fallback() {
        for strategy in STRATEGIES {
            let parent = Rc::new(Locals::root().with_binding("key", "value"));
            assert_eq!(
                with_locals(strategy, "key", Locals::child(&parent)),
                vec!["key=value"]
            );
            assert_eq!(
                with_locals(strategy, "key", Locals::child(&parent).with_binding("key", "inner")),
                vec!["key=inner"]
            );
            assert_eq!(
                with_locals(strategy, "name", Locals::child(&parent)),
                vec!["name=misko"]
            );
        }
    }

    #[test]
    fn test_pipe_output_is_the_record_value() {
        for strategy in STRATEGIES {
            let factory = CountingFactory::new(|| -> Box<dyn Pipe> { Box::new(CountingPipe::default()) });
            let mut fx = Fixture::new(strategy, registry_with("pipe", factory), &[("name | pipe", "1")]);
            fx.hydrate(&person("bob"));

            fx.tree.detect_changes(fx.id).unwrap();
            let notifications = fx.log.borrow_mut().take();
            let change = &notifications[0].changes[0];
            assert_eq!(change.current_value, Value::from("bob state:0"));
            assert_eq!(change.previous_value, SlotValue::Uninitialized);

            assert_eq!(fx.detect(), vec!["name | pipe=bob state:1"]);
        }
    }

    #[test]
    fn test_unsupported_pipe_is_destroyed_and_reselected() {
        for strategy in STRATEGIES {
            let destroyed = Rc::new(Cell::new(0));
            let factory = once_factory(&destroyed);
            let created = Rc::clone(&factory.created);
            let person = person("bob");
            let mut fx = Fixture::new(strategy, registry_with("pipe", factory), &[("name | pipe", "1")]);
            fx.hydrate(&person);

            assert_eq!(fx.detect(), vec!["name | pipe=bob"]);
            assert_eq!(created.get(), 1);
            assert_eq!(destroyed.get(), 0);

            person.set("name", "Misko");
            assert_eq!(fx.detect(), vec!["name | pipe=Misko"]);
            assert_eq!(created.get(), 2);
            assert_eq!(destroyed.get(), 1);
        }
    }

    #[test]
    fn test_switched_pipe_is_destroyed_before_replacement_transforms() {
        for strategy in STRATEGIES {
            let events = Rc::new(RefCell::new(Vec::new()));
            let person = person("bob");
            let mut fx = Fixture::new(
                strategy,
                registry_with("pipe", traced_factory(&events)),
                &[("name | pipe", "1")],
            );
            fx.hydrate(&person);

            fx.detect();
            person.set("name", "Misko");
            fx.detect();
            assert_eq!(*events.borrow(), ["transform#0", "destroy#0", "transform#1"]);

            fx.tree.dehydrate(fx.id).unwrap();
            assert_eq!(events.borrow().last().map(String::as_str), Some("destroy#1"));
            assert_eq!(events.borrow().len(), 4);
        }
    }

    #[test]
    fn test_no_change_pipe_suppresses_the_record() {
        for strategy in STRATEGIES {
            let factory = CountingFactory::new(|| -> Box<dyn Pipe> { Box::new(IdentityPipe::default()) });
            let person = person("bob");
            let mut fx = Fixture::new(strategy, registry_with("pipe", factory), &[("name | pipe", "1")]);
            fx.hydrate(&person);

            assert_eq!(fx.detect(), vec!["name | pipe=bob"]);
            assert!(fx.detect().is_empty());
            person.set("name", "Misko");
            assert_eq!(fx.detect(), vec!["name | pipe=Misko"]);
        }
    }

    #[test]
    fn test_nested_pipe_keeps_last_value() {
        for strategy in STRATEGIES {
            let factory = CountingFactory::new(|| -> Box<dyn Pipe> { Box::new(IdentityPipe::default()) });
            let mut fx = Fixture::new(strategy, registry_with("pipe", factory), &[("'<' + (name | pipe) + '>'", "1")]);
            fx.hydrate(&person("bob"));

            assert_eq!(fx.detect(), vec!["'<' + (name | pipe) + '>'=<bob>"]);
            assert!(fx.detect().is_empty());
        }
    }

    #[test]
    fn test_pipe_arguments() {
        for strategy in STRATEGIES {
            let factory = CountingFactory::new(|| -> Box<dyn Pipe> { Box::new(JoinPipe) });
            let mut fx = Fixture::new(strategy, registry_with("join", factory), &[("name | join:1:'x'", "1")]);
            fx.hydrate(&person("bob"));
            assert_eq!(fx.detect(), vec!["name | join:1:'x'=bob-1-x"]);
        }
    }

    #[test]
    fn test_missing_pipe_is_an_evaluation_error() {
        for strategy in STRATEGIES {
            let mut fx = Fixture::watching(strategy, &["name | missing"]);
            fx.hydrate(&person("bob"));

            let err = fx.tree.detect_changes(fx.id).unwrap_err();
            assert!(matches!(
                err,
                DetectorError::Evaluation {
                    source: EvalError::Pipe { .. },
                    ..
                }
            ));
            assert!(err.to_string().contains("cannot find pipe 'missing'"));
        }
    }

    #[test]
    fn test_default_pipes_switch_between_list_and_null() {
        for strategy in STRATEGIES {
            let context = Rc::new(Record::new("Ctx").with_field("items", vec![Value::Int(1)]));
            let mut fx = Fixture::new(strategy, PipeRegistry::default_pipes(), &[("items | iterableDiff", "1")]);
            fx.hydrate(&context);

            fx.tree.detect_changes(fx.id).unwrap();
            let notifications = fx.log.borrow_mut().take();
            let changes = &notifications[0].changes[0].current_value;
            assert_eq!(changes.read_field("collection").unwrap(), Value::from(vec![Value::Int(1)]));
            assert!(fx.detect().is_empty());

            context.set("items", Value::Null);
            assert_eq!(fx.detect(), vec!["items | iterableDiff=null"]);
            assert!(fx.detect().is_empty());
        }
    }

    #[test]
    fn test_dehydrate_destroys_pipes_and_clears_cache() {
        for strategy in STRATEGIES {
            let destroyed = Rc::new(Cell::new(0));
            let mut fx = Fixture::new(strategy, registry_with("pipe", once_factory(&destroyed)), &[("name | pipe", "1")]);
            fx.hydrate(&person("bob"));
            fx.detect();

            fx.tree.dehydrate(fx.id).unwrap();
            assert_eq!(destroyed.get(), 1);
            assert!(!fx.tree.hydrated(fx.id).unwrap());
            let detector = fx.tree.get(fx.id).unwrap();
            assert_eq!(detector.previous_value(0), Some(&SlotValue::Uninitialized));
            assert!(detector.context().is_none());
        }
    }

    #[test]
    fn test_unhydrated_detector_checks_nothing() {
        for strategy in STRATEGIES {
            let mut fx = Fixture::watching(strategy, &["name"]);
            assert!(!fx.tree.hydrated(fx.id).unwrap());
            assert!(fx.detect().is_empty());
        }
    }

    #[test]
    fn test_rehydration_reports_again() {
        for strategy in STRATEGIES {
            let mut fx = Fixture::watching(strategy, &["name"]);
            fx.hydrate(&person("bob"));
            assert_eq!(fx.detect(), vec!["name=bob"]);

            fx.tree.dehydrate(fx.id).unwrap();
            fx.hydrate(&person("bob"));
            assert_eq!(fx.detect(), vec!["name=bob"]);
        }
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(Mode::default(), Mode::CheckAlways);
        assert_eq!(Mode::CheckOnce.to_string(), "check_once");
        assert!(Mode::Checked.is_skipped());
        assert!(Mode::Detached.is_skipped());
        assert!(!Mode::CheckOnce.is_skipped());
    }
}
