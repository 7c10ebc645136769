//! Shared fixtures for detector tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dc_core::{EvaluatorStrategy, GroupId, Record, Value};
use dc_expr::Parser;

use crate::dispatcher::{ChangeDispatcher, ChangeLog, ChangeRecord};
use crate::error::{BoxError, PipeError};
use crate::pipe::{Pipe, PipeFactory, Transformed};
use crate::proto::{BindingRecord, ProtoChangeDetector};
use crate::registry::PipeRegistry;
use crate::tree::{ChangeDetectorTree, DetectorId};

pub const STRATEGIES: [EvaluatorStrategy; 2] = [EvaluatorStrategy::Interpreted, EvaluatorStrategy::Compiled];

/// A tree holding one detector whose notifications land in `log`.
pub struct Fixture {
    pub tree: ChangeDetectorTree,
    pub id: DetectorId,
    pub log: Rc<RefCell<ChangeLog>>,
}

impl Fixture {
    /// Watches `(expression, group)` pairs; each binding id is its expression.
    pub fn new(strategy: EvaluatorStrategy, registry: PipeRegistry, watches: &[(&str, &str)]) -> Self {
        let log = Rc::new(RefCell::new(ChangeLog::default()));
        let records = records(watches);
        let proto = ProtoChangeDetector::new("test", Rc::new(registry), strategy);
        let mut tree = ChangeDetectorTree::new();
        let id = tree.insert(proto.instantiate(Rc::clone(&log), &records, &[]));
        Self { tree, id, log }
    }

    /// Watches `expressions` in one group with no pipes registered.
    pub fn watching(strategy: EvaluatorStrategy, expressions: &[&str]) -> Self {
        let watches: Vec<(&str, &str)> = expressions.iter().map(|exp| (*exp, "1")).collect();
        Self::new(strategy, PipeRegistry::new(), &watches)
    }

    pub fn hydrate(&mut self, context: &Rc<Record>) {
        self.tree
            .hydrate(self.id, Value::object(Rc::clone(context)), None)
            .unwrap();
    }

    pub fn detect(&mut self) -> Vec<String> {
        self.tree.detect_changes(self.id).unwrap();
        self.log.borrow_mut().take_values()
    }
}

pub fn records(watches: &[(&str, &str)]) -> Vec<BindingRecord> {
    let mut parser = Parser::new();
    watches
        .iter()
        .map(|(exp, group)| BindingRecord::new(parser.parse_binding(exp, "location").unwrap(), *exp, *group))
        .collect()
}

/// Dispatcher that appends the binding ids of each group, comma-joined, to a
/// shared event log.
pub struct EventDispatcher(pub Rc<RefCell<Vec<String>>>);

impl ChangeDispatcher for EventDispatcher {
    fn on_record_change(&mut self, _group: &GroupId, changes: &[ChangeRecord]) -> Result<(), BoxError> {
        let ids: Vec<&str> = changes.iter().map(|change| change.binding_id.as_str()).collect();
        self.0.borrow_mut().push(ids.join(","));
        Ok(())
    }
}

/// Dispatcher that always fails.
pub struct FailingDispatcher;

impl ChangeDispatcher for FailingDispatcher {
    fn on_record_change(&mut self, _group: &GroupId, _changes: &[ChangeRecord]) -> Result<(), BoxError> {
        Err("dispatcher exploded".into())
    }
}

/// Publishes `"{value} state:{n}"`, counting transforms.
#[derive(Debug, Default)]
pub struct CountingPipe {
    state: usize,
}

impl Pipe for CountingPipe {
    fn supports(&self, _value: &Value) -> bool {
        true
    }

    fn transform(&mut self, value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
        let out = format!("{value} state:{}", self.state);
        self.state += 1;
        Ok(Value::from(out).into())
    }
}

/// Supports values only until its first transform; records destruction.
#[derive(Debug)]
pub struct OncePipe {
    called: bool,
    destroyed: Rc<Cell<usize>>,
}

impl Pipe for OncePipe {
    fn supports(&self, _value: &Value) -> bool {
        !self.called
    }

    fn transform(&mut self, value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
        self.called = true;
        Ok(value.clone().into())
    }

    fn on_destroy(&mut self) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

/// Suppresses the check when the value is identical to the last one seen.
#[derive(Debug, Default)]
pub struct IdentityPipe {
    state: Option<Value>,
}

impl Pipe for IdentityPipe {
    fn supports(&self, _value: &Value) -> bool {
        true
    }

    fn transform(&mut self, value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
        if self.state.as_ref().is_some_and(|state| state.loose_identical(value)) {
            return Ok(Transformed::NoChange);
        }
        self.state = Some(value.clone());
        Ok(value.clone().into())
    }
}

/// Joins the value and every argument with `-`.
#[derive(Debug, Default)]
pub struct JoinPipe;

impl Pipe for JoinPipe {
    fn supports(&self, _value: &Value) -> bool {
        true
    }

    fn transform(&mut self, value: &Value, args: &[Value]) -> Result<Transformed, PipeError> {
        let mut out = value.to_string();
        for arg in args {
            out.push('-');
            out.push_str(&arg.to_string());
        }
        Ok(Value::from(out).into())
    }
}

/// Factory built from a closure, counting how many pipes it created.
pub struct CountingFactory<F> {
    make: F,
    pub created: Rc<Cell<usize>>,
}

impl<F> std::fmt::Debug for CountingFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingFactory").field("created", &self.created).finish()
    }
}

impl<F: Fn() -> Box<dyn Pipe>> CountingFactory<F> {
    pub fn new(make: F) -> Self {
        Self {
            make,
            created: Rc::new(Cell::new(0)),
        }
    }
}

impl<F: Fn() -> Box<dyn Pipe>> PipeFactory for CountingFactory<F> {
    fn supports(&self, _value: &Value) -> bool {
        true
    }

    fn create(&self) -> Box<dyn Pipe> {
        self.created.set(self.created.get() + 1);
        (self.make)()
    }
}

/// A factory producing [`OncePipe`]s that all report into `destroyed`.
pub fn once_factory(destroyed: &Rc<Cell<usize>>) -> CountingFactory<impl Fn() -> Box<dyn Pipe> + use<>> {
    let destroyed = Rc::clone(destroyed);
    CountingFactory::new(move || -> Box<dyn Pipe> {
        Box::new(OncePipe {
            called: false,
            destroyed: Rc::clone(&destroyed),
        })
    })
}

/// Supports values only until its first transform, logging
/// `transform#n` and `destroy#n` into a shared event list.
#[derive(Debug)]
pub struct TracedPipe {
    id: usize,
    called: bool,
    events: Rc<RefCell<Vec<String>>>,
}

impl Pipe for TracedPipe {
    fn supports(&self, _value: &Value) -> bool {
        !self.called
    }

    fn transform(&mut self, value: &Value, _args: &[Value]) -> Result<Transformed, PipeError> {
        self.called = true;
        self.events.borrow_mut().push(format!("transform#{}", self.id));
        Ok(value.clone().into())
    }

    fn on_destroy(&mut self) {
        self.events.borrow_mut().push(format!("destroy#{}", self.id));
    }
}

/// A factory numbering its [`TracedPipe`]s from zero.
pub fn traced_factory(events: &Rc<RefCell<Vec<String>>>) -> CountingFactory<impl Fn() -> Box<dyn Pipe> + use<>> {
    let events = Rc::clone(events);
    let next = Cell::new(0);
    CountingFactory::new(move || -> Box<dyn Pipe> {
        let id = next.get();
        next.set(id + 1);
        Box::new(TracedPipe {
            id,
            called: false,
            events: Rc::clone(&events),
        })
    })
}
