//! Chained name scopes for template-local variables.
//!
//! A [`Locals`] frame maps names to values and optionally points at a parent
//! frame. Lookups walk innermost-first; names not found in any frame fall
//! back to a field read on the detector context (done by the evaluator).
//!
//! Frames are immutable once shared. Entering a nested repeating context
//! builds a new child frame rather than mutating an existing one, so inner
//! loop variables shadow outer ones without disturbing them.
//!
//! ```
//! use std::rc::Rc;
//! use dc_core::Value;
//! use dc_expr::Locals;
//!
//! let outer = Rc::new(Locals::root().with_binding("item", "outer").with_binding("index", 0));
//! let inner = Locals::child(&outer).with_binding("item", "inner");
//!
//! assert_eq!(inner.resolve("item"), Some(&Value::from("inner")));
//! assert_eq!(inner.resolve("index"), Some(&Value::Int(0)));
//! assert_eq!(inner.resolve("missing"), None);
//! ```

use std::rc::Rc;

use dc_core::{FxHashMap, Value};

/// One frame of a locals chain.
#[derive(Debug, Default)]
pub struct Locals {
    parent: Option<Rc<Locals>>,
    current: FxHashMap<String, Value>,
}

impl Locals {
    /// Creates a frame from a parent and its bindings.
    #[must_use]
    pub fn new(parent: Option<Rc<Self>>, current: FxHashMap<String, Value>) -> Self {
        Self { parent, current }
    }

    /// Creates an empty frame without a parent.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates an empty frame nested in `parent`.
    #[must_use]
    pub fn child(parent: &Rc<Self>) -> Self {
        Self {
            parent: Some(Rc::clone(parent)),
            current: FxHashMap::default(),
        }
    }

    /// Adds a binding to this frame while it is being built.
    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.current.insert(name.into(), value.into());
        self
    }

    /// The enclosing frame.
    #[must_use]
    pub fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    /// Returns `true` if any frame of the chain binds `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Looks `name` up innermost-first.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        let mut frame = Some(self);
        while let Some(locals) = frame {
            if let Some(value) = locals.current.get(name) {
                return Some(value);
            }
            frame = locals.parent.as_deref();
        }
        None
    }

    /// Names bound anywhere in the chain, innermost frame first. A shadowed
    /// name appears once per frame that binds it.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::successors(Some(self), |locals| locals.parent.as_deref())
            .flat_map(|locals| locals.current.keys().map(String::as_str))
    }
}
