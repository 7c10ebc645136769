//! Field access on opaque host objects.
//!
//! The engine never knows the shape of the data it watches. Any host type
//! that implements [`Reflect`] can be bound as a detector context or stored
//! inside a [`Value::Object`].

use std::cell::RefCell;
use std::fmt;

use crate::error::ValueError;
use crate::types::Value;
use crate::FxHashMap;

/// Read access to the fields and methods of a host object.
///
/// Only [`type_name`](Reflect::type_name) and
/// [`read_field`](Reflect::read_field) are required. Keyed reads stringify the
/// key and delegate to `read_field`; invocation calls a function-valued field.
///
/// # Examples
///
/// ```
/// use dc_core::{Reflect, Value, ValueError};
///
/// #[derive(Debug)]
/// struct Point { x: i64, y: i64 }
///
/// impl Reflect for Point {
///     fn type_name(&self) -> &str { "Point" }
///
///     fn read_field(&self, name: &str) -> Result<Value, ValueError> {
///         match name {
///             "x" => Ok(Value::Int(self.x)),
///             "y" => Ok(Value::Int(self.y)),
///             _ => Err(ValueError::UnknownField {
///                 type_name: self.type_name().to_owned(),
///                 name: name.to_owned(),
///             }),
///         }
///     }
/// }
///
/// let p = Point { x: 1, y: 2 };
/// assert_eq!(p.read_keyed(&Value::from("y"))?, Value::Int(2));
/// # Ok::<(), ValueError>(())
/// ```
pub trait Reflect: fmt::Debug {
    /// Name used in error messages and `Display` output.
    fn type_name(&self) -> &str;

    /// Reads the named field.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownField`] if the object has no such field.
    fn read_field(&self, name: &str) -> Result<Value, ValueError>;

    /// Reads a field selected by a runtime key.
    ///
    /// # Errors
    ///
    /// Same as [`read_field`](Reflect::read_field).
    fn read_keyed(&self, key: &Value) -> Result<Value, ValueError> {
        match key {
            Value::Str(name) => self.read_field(name),
            other => self.read_field(&other.to_string()),
        }
    }

    /// Calls the named method.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::NotCallable`] if the field is not a function, or
    /// the function's own error.
    fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, ValueError> {
        match self.read_field(name)? {
            Value::Function(f) => f.call(args),
            other => Err(ValueError::NotCallable {
                name: name.to_owned(),
                kind: other.kind(),
            }),
        }
    }

    /// Lists fields for export, sorted by name. Empty by default.
    fn fields(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// A named bag of fields implementing [`Reflect`].
///
/// Fields are stored behind a [`RefCell`] so the host can update application
/// state through a shared handle between change detection passes. The engine
/// itself only reads.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use dc_core::{Record, Reflect, Value};
///
/// let person = Rc::new(Record::new("Person").with_field("name", "misko"));
/// let context = Value::object(Rc::clone(&person));
///
/// person.set("name", "Misko");
/// assert_eq!(context.read_field("name")?, Value::from("Misko"));
/// # Ok::<(), dc_core::ValueError>(())
/// ```
pub struct Record {
    type_name: String,
    fields: RefCell<FxHashMap<String, Value>>,
}

impl Record {
    /// Creates an empty record.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: RefCell::new(FxHashMap::default()),
        }
    }

    /// Builder-style field initialisation.
    #[must_use]
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.borrow_mut().insert(name.into(), value.into());
        self
    }

    /// Builds a record from the entries of a JSON object.
    #[must_use]
    pub fn from_json_object(
        type_name: impl Into<String>,
        object: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let fields = object
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect();
        Self {
            type_name: type_name.into(),
            fields: RefCell::new(fields),
        }
    }

    /// Sets a field, returning the previous value if any.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.borrow_mut().insert(name.into(), value.into())
    }

    /// Returns a copy of the field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Removes a field.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.fields.borrow_mut().remove(name)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    /// Returns `true` if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields())
            .finish()
    }
}

impl Reflect for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn read_field(&self, name: &str) -> Result<Value, ValueError> {
        self.get(name).ok_or_else(|| ValueError::UnknownField {
            type_name: self.type_name.clone(),
            name: name.to_owned(),
        })
    }

    fn fields(&self) -> Vec<(String, Value)> {
        let mut fields: Vec<_> = self
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        fields
    }
}
