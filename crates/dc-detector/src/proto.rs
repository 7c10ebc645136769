//! Reusable detector templates.

use std::rc::Rc;

use dc_core::{BindingId, EvaluatorStrategy, GroupId};
use dc_expr::{evaluator, AstWithSource};
use tracing::debug;

use crate::detector::ChangeDetector;
use crate::dispatcher::ChangeDispatcher;
use crate::registry::PipeRegistry;

/// One declared watch: an expression plus its reporting labels.
#[derive(Debug, Clone)]
pub struct BindingRecord {
    /// The parsed expression, shared by every detector built from it.
    pub ast: Rc<AstWithSource>,
    /// Key reported to the dispatcher and used in error messages.
    pub binding_id: BindingId,
    /// Consecutive records with equal group ids are flushed together.
    pub group_id: GroupId,
}

impl BindingRecord {
    /// Creates a binding record.
    pub fn new(ast: Rc<AstWithSource>, binding_id: impl Into<BindingId>, group_id: impl Into<GroupId>) -> Self {
        Self {
            ast,
            binding_id: binding_id.into(),
            group_id: group_id.into(),
        }
    }
}

/// Factory for [`ChangeDetector`] instances.
///
/// Holds the pipe registry and the evaluator strategy; every detector it
/// instantiates shares the registry and gets its own evaluators, caches and
/// pipe slots.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use dc_core::{EvaluatorStrategy, Record, Value};
/// use dc_detector::{BindingRecord, ChangeDetectorTree, ChangeLog, PipeRegistry, ProtoChangeDetector};
/// use dc_expr::Parser;
///
/// let proto = ProtoChangeDetector::new("person", Rc::new(PipeRegistry::default_pipes()), EvaluatorStrategy::Compiled);
/// let record = BindingRecord::new(Parser::new().parse_binding("name", "location")?, "name", "1");
/// let log = Rc::new(std::cell::RefCell::new(ChangeLog::default()));
///
/// let mut tree = ChangeDetectorTree::new();
/// let id = tree.insert(proto.instantiate(Rc::clone(&log), &[record], &[]));
/// let person = Rc::new(Record::new("Person").with_field("name", "misko"));
/// tree.hydrate(id, Value::object(Rc::clone(&person)), None)?;
///
/// tree.detect_changes(id)?;
/// assert_eq!(log.borrow_mut().take_values(), vec!["name=misko"]);
/// tree.detect_changes(id)?;
/// assert!(log.borrow().is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProtoChangeDetector {
    name: Rc<str>,
    registry: Rc<PipeRegistry>,
    strategy: EvaluatorStrategy,
}

impl ProtoChangeDetector {
    /// Creates a proto detector.
    pub fn new(name: impl Into<Rc<str>>, registry: Rc<PipeRegistry>, strategy: EvaluatorStrategy) -> Self {
        Self {
            name: name.into(),
            registry,
            strategy,
        }
    }

    /// The name given to instantiated detectors, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The evaluator strategy.
    #[must_use]
    pub const fn strategy(&self) -> EvaluatorStrategy {
        self.strategy
    }

    /// The shared pipe registry.
    #[must_use]
    pub const fn registry(&self) -> &Rc<PipeRegistry> {
        &self.registry
    }

    /// Builds a dehydrated detector in `CheckAlways` mode watching `records`
    /// in order. `local_names` are the template-local variables the detector
    /// expects its locals to bind.
    pub fn instantiate(
        &self,
        dispatcher: impl ChangeDispatcher + 'static,
        records: &[BindingRecord],
        local_names: &[String],
    ) -> ChangeDetector {
        debug!(
            detector = %self.name,
            strategy = self.strategy.label(),
            bindings = records.len(),
            "instantiating change detector"
        );
        let bindings = records
            .iter()
            .map(|record| {
                (
                    record.binding_id.clone(),
                    record.group_id.clone(),
                    evaluator(self.strategy, Rc::clone(&record.ast)),
                )
            })
            .collect();
        ChangeDetector::new(
            Rc::clone(&self.name),
            Rc::clone(&self.registry),
            Box::new(dispatcher),
            bindings,
            local_names.into(),
        )
    }
}
