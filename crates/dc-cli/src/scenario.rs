//! JSON scenarios driven through a single change detector.
//!
//! A scenario names the bindings to watch, the initial context record, the
//! optional locals and a list of steps. Each step mutates the context and is
//! followed by one life-cycle tick; an initial tick runs before the first
//! step so the first values are reported.
//!
//! ```json
//! {
//!   "config": { "strategy": "compiled" },
//!   "context": { "name": "misko", "items": [1, 2] },
//!   "bindings": [
//!     { "expression": "name" },
//!     { "expression": "items | iterableDiff", "id": "items", "group": "list" }
//!   ],
//!   "steps": [{ "set": { "name": "Misko" } }]
//! }
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use camino::Utf8Path;
use color_eyre::eyre::{eyre, WrapErr};
use dc_core::{BindingId, EngineConfig, GroupId, Record, Value};
use dc_detector::{
    BindingRecord, ChangeDetectorTree, ChangeLog, ChangeRecord, LifeCycle, Notification,
    PipeRegistry, ProtoChangeDetector,
};
use dc_expr::{Locals, ParseError, Parser};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

type JsonMap = serde_json::Map<String, serde_json::Value>;

fn default_context_type() -> String {
    "Context".to_owned()
}

/// A scenario file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Engine settings; command-line flags override them.
    #[serde(default)]
    pub config: EngineConfig,

    /// Type name of the context record, used in error messages.
    #[serde(default = "default_context_type")]
    pub context_type: String,

    /// Initial fields of the context record.
    #[serde(default)]
    pub context: JsonMap,

    /// Template locals. Their names are declared on the detector.
    #[serde(default)]
    pub locals: JsonMap,

    /// Watched expressions in evaluation order.
    pub bindings: Vec<BindingSpec>,

    /// Context mutations, one tick each.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One watched expression.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingSpec {
    /// Expression source.
    pub expression: String,

    /// Binding id; defaults to the expression source.
    #[serde(default)]
    pub id: Option<BindingId>,

    /// Group id; consecutive bindings sharing a group are dispatched together.
    #[serde(default)]
    pub group: Option<GroupId>,

    /// Parse the expression as `{{ }}` interpolation text.
    #[serde(default)]
    pub interpolation: bool,
}

impl BindingSpec {
    fn record(&self, parser: &mut Parser, location: &str) -> Result<BindingRecord, ParseError> {
        let ast = if self.interpolation {
            parser.parse_interpolation(&self.expression, location)?
        } else {
            parser.parse_binding(&self.expression, location)?
        };
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| BindingId::new(self.expression.as_str()));
        let group = self.group.clone().unwrap_or_else(|| GroupId::new("default"));
        Ok(BindingRecord::new(ast, id, group))
    }
}

/// Context mutations applied before a tick.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Fields to write.
    #[serde(default)]
    pub set: JsonMap,

    /// Fields to delete. Reading a deleted field is an evaluation error.
    #[serde(default)]
    pub remove: Vec<String>,
}

impl Step {
    fn apply(&self, context: &Record) {
        for (name, value) in &self.set {
            context.set(name.as_str(), Value::from(value.clone()));
        }
        for name in &self.remove {
            context.remove(name);
        }
    }
}

/// One changed binding, as printed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeReport {
    /// Binding id.
    pub binding: BindingId,
    /// Value cached before the tick; absent on first evaluation.
    pub previous: Option<serde_json::Value>,
    /// Newly evaluated value.
    pub current: serde_json::Value,
}

impl From<&ChangeRecord> for ChangeReport {
    fn from(change: &ChangeRecord) -> Self {
        Self {
            binding: change.binding_id.clone(),
            previous: change.previous_value.value().map(Value::to_json),
            current: change.current_value.to_json(),
        }
    }
}

/// One dispatched group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    /// Group id.
    pub group: GroupId,
    /// Changes in evaluation order.
    pub changes: Vec<ChangeReport>,
}

impl From<Notification> for GroupReport {
    fn from(notification: Notification) -> Self {
        Self {
            changes: notification.changes.iter().map(ChangeReport::from).collect(),
            group: notification.group,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// Zero for the initial tick, then one per scenario step.
    pub step: usize,
    /// Groups dispatched during the tick.
    pub groups: Vec<GroupReport>,
    /// Error that aborted the tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Scenario {
    /// Reads a scenario from a JSON file.
    pub fn from_path(path: &Utf8Path) -> color_eyre::Result<Self> {
        if !path.is_file() {
            return Err(eyre!("Scenario file does not exist: {path}"));
        }
        let json = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {path}"))?;
        Self::from_json_str(&json).wrap_err_with(|| format!("Invalid scenario {path}"))
    }

    /// Parses a scenario from JSON text.
    pub fn from_json_str(json: &str) -> color_eyre::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Runs the scenario with `config`, stopping at the first failed tick.
    ///
    /// Parse errors in the bindings are returned before any tick runs; tick
    /// failures are recorded on the report of the failing step.
    pub fn run(&self, config: EngineConfig) -> color_eyre::Result<Vec<StepReport>> {
        let mut parser = Parser::new();
        let records = self
            .bindings
            .iter()
            .enumerate()
            .map(|(index, binding)| binding.record(&mut parser, &format!("bindings[{index}]")))
            .collect::<Result<Vec<_>, _>>()?;
        let local_names: Vec<String> = self.locals.keys().cloned().collect();

        let log = Rc::new(RefCell::new(ChangeLog::default()));
        let proto = ProtoChangeDetector::new(
            "scenario",
            Rc::new(PipeRegistry::default_pipes()),
            config.strategy,
        );
        let mut tree = ChangeDetectorTree::new();
        let root = tree.insert(proto.instantiate(Rc::clone(&log), &records, &local_names));

        let context = Rc::new(Record::from_json_object(
            self.context_type.as_str(),
            self.context.clone(),
        ));
        let locals = (!self.locals.is_empty()).then(|| {
            let locals = self.locals.iter().fold(Locals::root(), |locals, (name, value)| {
                locals.with_binding(name.as_str(), Value::from(value.clone()))
            });
            Rc::new(locals)
        });
        tree.hydrate(root, Value::object(Rc::clone(&context)), locals)
            .map_err(|err| eyre!("{err}"))?;

        info!(
            bindings = records.len(),
            steps = self.steps.len(),
            strategy = config.strategy.label(),
            strict = config.enforce_no_new_changes,
            "running scenario"
        );

        let life_cycle = LifeCycle::from_config(root, &config);
        let initial = Step::default();
        let mut reports = Vec::with_capacity(self.steps.len() + 1);
        for (index, step) in std::iter::once(&initial).chain(&self.steps).enumerate() {
            step.apply(&context);
            let result = life_cycle.tick(&mut tree);
            let groups: Vec<GroupReport> = log
                .borrow_mut()
                .take()
                .into_iter()
                .map(GroupReport::from)
                .collect();
            debug!(step = index, groups = groups.len(), "tick finished");

            let error = result.err().map(|err| err.to_string());
            let failed = error.is_some();
            reports.push(StepReport {
                step: index,
                groups,
                error,
            });
            if failed {
                break;
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use dc_core::EvaluatorStrategy;
    use serde_json::json;

    use super::*;

    const STRATEGIES: [EvaluatorStrategy; 2] = [EvaluatorStrategy::Interpreted, EvaluatorStrategy::Compiled];

    fn config(strategy: EvaluatorStrategy, strict: bool) -> EngineConfig {
        EngineConfig {
            strategy,
            enforce_no_new_changes: strict,
        }
    }

    fn run(json: &str, strategy: EvaluatorStrategy) -> Vec<StepReport> {
        Scenario::from_json_str(json).unwrap().run(config(strategy, false)).unwrap()
    }

    #[test]
    fn test_scenario_defaults() {
        let scenario = Scenario::from_json_str(r#"{"bindings": [{"expression": "a"}]}"#).unwrap();
        assert_eq!(scenario.config, EngineConfig::default());
        assert_eq!(scenario.context_type, "Context");
        assert!(scenario.steps.is_empty());
        assert!(!scenario.bindings[0].interpolation);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(Scenario::from_json_str(r#"{"bindings": [], "stpes": []}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::from_path(Utf8Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_steps_report_changes() {
        let json = r#"{
            "context": {"a": 1, "b": 2},
            "bindings": [
                {"expression": "a + b", "id": "sum"},
                {"expression": "a", "group": "other"}
            ],
            "steps": [{"set": {"a": 10}}, {"set": {"b": 2}}]
        }"#;
        for strategy in STRATEGIES {
            let reports = run(json, strategy);
            assert_eq!(reports.len(), 3);

            assert_eq!(reports[0].groups.len(), 2);
            assert_eq!(
                reports[0].groups[0],
                GroupReport {
                    group: GroupId::new("default"),
                    changes: vec![ChangeReport {
                        binding: BindingId::new("sum"),
                        previous: None,
                        current: json!(3),
                    }],
                }
            );

            let second: Vec<_> = reports[1].groups.iter().map(|g| g.group.as_str()).collect();
            assert_eq!(second, ["default", "other"]);
            assert_eq!(reports[1].groups[0].changes[0].previous, Some(json!(3)));
            assert_eq!(reports[1].groups[0].changes[0].current, json!(12));

            assert!(reports[2].groups.is_empty());
            assert!(reports.iter().all(|report| report.error.is_none()));
        }
    }

    #[test]
    fn test_locals_and_interpolation() {
        let json = r#"{
            "context": {"name": "misko"},
            "locals": {"greeting": "Hello"},
            "bindings": [{"expression": "{{greeting}} {{name}}!", "id": "text", "interpolation": true}],
            "steps": [{"set": {"name": "igor"}}]
        }"#;
        for strategy in STRATEGIES {
            let reports = run(json, strategy);
            assert_eq!(reports[0].groups[0].changes[0].current, json!("Hello misko!"));
            assert_eq!(reports[1].groups[0].changes[0].current, json!("Hello igor!"));
        }
    }

    #[test]
    fn test_iterable_diff_step() {
        let json = r#"{
            "context": {"items": ["a"]},
            "bindings": [{"expression": "items | iterableDiff", "id": "items"}],
            "steps": [{"set": {"items": ["a", "b"]}}, {"set": {"items": ["a", "b"]}}]
        }"#;
        for strategy in STRATEGIES {
            let reports = run(json, strategy);
            let change = &reports[1].groups[0].changes[0];
            assert_eq!(change.current["additions"], json!([{"item": "b", "currentIndex": 1}]));
            assert!(reports[2].groups.is_empty());
        }
    }

    #[test]
    fn test_removed_field_fails_the_step() {
        let json = r#"{
            "context": {"a": 1},
            "bindings": [{"expression": "a"}],
            "steps": [{"remove": ["a"]}, {"set": {"a": 2}}]
        }"#;
        for strategy in STRATEGIES {
            let reports = run(json, strategy);
            assert_eq!(reports.len(), 2);
            let error = reports[1].error.as_deref().unwrap();
            assert!(error.ends_with("in [a in bindings[0]]"), "{error}");
        }
    }

    #[test]
    fn test_strict_mode_passes_stable_bindings() {
        let json = r#"{
            "context": {"items": [1], "props": {"x": 1}},
            "bindings": [{"expression": "[items, {n: items[0]}]"}, {"expression": "props | keyValDiff", "id": "kv"}],
            "steps": [{"set": {"items": [2], "props": {"x": 2}}}]
        }"#;
        let scenario = Scenario::from_json_str(json).unwrap();
        for strategy in STRATEGIES {
            let relaxed = scenario.run(config(strategy, false)).unwrap();
            let strict = scenario.run(config(strategy, true)).unwrap();
            assert_eq!(relaxed, strict);
            assert!(strict.iter().all(|report| report.error.is_none()));
        }
    }

    #[test]
    fn test_bundled_scenario() {
        let path = Utf8Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/todo.json"));
        let scenario = Scenario::from_path(path).unwrap();
        for strategy in STRATEGIES {
            let reports = scenario.run(config(strategy, true)).unwrap();
            assert_eq!(reports.len(), 5);
            assert!(reports.iter().all(|report| report.error.is_none()));
            assert_eq!(reports[0].groups[0].changes[0].current, json!("misko's Groceries"));

            let reorder = &reports[3].groups;
            let list = reorder.iter().find(|group| group.group.as_str() == "list").unwrap();
            assert_eq!(list.changes.len(), 1);
            assert_eq!(list.changes[0].binding.as_str(), "items");
            assert_eq!(list.changes[0].current["moves"].as_array().map(Vec::len), Some(2));

            assert!(reports[4].groups.is_empty());
        }
    }

    #[test]
    fn test_parse_error_aborts_before_ticks() {
        let scenario = Scenario::from_json_str(r#"{"bindings": [{"expression": "a +"}]}"#).unwrap();
        let err = scenario.run(EngineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("in bindings[0]"));
    }
}
