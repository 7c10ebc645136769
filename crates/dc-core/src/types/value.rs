//! The dynamic value type flowing through expressions and change records.
//!
//! [`Value`] is cheap to clone: strings, lists, maps and objects are
//! reference counted, so caching a previous value in a detector slot never
//! deep-copies application state.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::ValueError;
use crate::types::{Function, Reflect};

/// A dynamically typed value.
///
/// # Equality
///
/// Two equalities exist:
///
/// - [`PartialEq`] follows IEEE float semantics (`NaN != NaN`) and is what the
///   `==` operator of the expression language uses.
/// - [`Value::loose_identical`] is the dirty-checking equality: identical to
///   `PartialEq` except that two `NaN`s compare equal, so an unchanged `NaN`
///   never reports a change.
///
/// Integers and floats compare numerically across variants. Lists and maps
/// compare element by element, since every evaluation of a literal allocates
/// a fresh container. Objects and functions compare by identity.
///
/// # Examples
///
/// ```
/// use dc_core::Value;
///
/// assert_eq!(Value::Int(5), Value::Float(5.0));
/// assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
/// assert!(Value::Float(f64::NAN).loose_identical(&Value::Float(f64::NAN)));
/// assert_eq!(Value::from(vec![Value::Int(1)]), Value::from(vec![Value::Int(1)]));
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absent value. `undefined` in expressions also evaluates to this.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// An immutable string.
    Str(Rc<str>),
    /// An immutable list.
    List(Rc<[Value]>),
    /// An immutable string-keyed map with sorted keys.
    Map(Rc<BTreeMap<String, Value>>),
    /// A host object exposing fields through [`Reflect`].
    Object(Rc<dyn Reflect>),
    /// A host closure.
    Function(Function),
}

impl Value {
    /// Wraps a host object.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::rc::Rc;
    /// use dc_core::{Record, Value};
    ///
    /// let person = Rc::new(Record::new("Person").with_field("name", "misko"));
    /// let value = Value::object(Rc::clone(&person));
    /// assert_eq!(value.read_field("name")?, Value::from("misko"));
    /// # Ok::<(), dc_core::ValueError>(())
    /// ```
    #[inline]
    pub fn object<T: Reflect + 'static>(object: Rc<T>) -> Self {
        Self::Object(object)
    }

    /// Returns a short name for the variant, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for integers and floats.
    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Truthiness as used by `!`, `&&`, `||` and `?:`.
    ///
    /// `null`, `false`, `0`, `NaN` and the empty string are falsy; everything
    /// else, including empty lists and maps, is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::List(_) | Self::Map(_) | Self::Object(_) | Self::Function(_) => true,
        }
    }

    /// Returns the numeric value as a float, if this is a number.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements, if this is a list.
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a map.
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Dirty-checking equality: like `==`, but `NaN` equals `NaN`.
    #[inline]
    #[must_use]
    pub fn loose_identical(&self, other: &Self) -> bool {
        self.eq_with(other, true)
    }

    fn eq_with(&self, other: &Self, nan_equal: bool) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                let (a, b) = (self.as_f64(), other.as_f64());
                match (a, b) {
                    (Some(a), Some(b)) => a == b || (nan_equal && a.is_nan() && b.is_nan()),
                    _ => false,
                }
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter().zip(b.iter()).all(|(x, y)| x.eq_with(y, nan_equal)))
            }
            (Self::Map(a), Self::Map(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter()
                            .zip(b.iter())
                            .all(|((ka, va), (kb, vb))| ka == kb && va.eq_with(vb, nan_equal)))
            }
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Reads a named member.
    ///
    /// Objects delegate to [`Reflect::read_field`]. Maps return the entry or
    /// `null` when absent. Strings, lists and maps expose `length`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownField`] when the receiver has no such
    /// member, including any read on `null`.
    pub fn read_field(&self, name: &str) -> Result<Self, ValueError> {
        match self {
            Self::Object(object) => object.read_field(name),
            Self::Map(entries) => Ok(match entries.get(name) {
                Some(value) => value.clone(),
                None if name == "length" => Self::from(entries.len()),
                None => Self::Null,
            }),
            Self::Str(s) if name == "length" => Ok(Self::from(s.chars().count())),
            Self::List(items) if name == "length" => Ok(Self::from(items.len())),
            other => Err(ValueError::UnknownField {
                type_name: other.kind().to_owned(),
                name: name.to_owned(),
            }),
        }
    }

    /// Reads an indexed member (`receiver[key]`).
    ///
    /// Lists accept integer keys, including whole non-negative floats such as
    /// the result of `4 / 2`, and yield `null` when out of range. Maps and
    /// objects accept any key, stringified.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownField`] when the receiver cannot be
    /// indexed by the key.
    pub fn read_keyed(&self, key: &Self) -> Result<Self, ValueError> {
        match (self, key) {
            (Self::List(items), Self::Int(index)) => Ok(usize::try_from(*index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default()),
            (Self::List(items), Self::Float(index)) if index.fract() == 0.0 && *index >= 0.0 => {
                // Saturates, so huge indices land out of range.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let index = *index as usize;
                Ok(items.get(index).cloned().unwrap_or_default())
            }
            (Self::Map(entries), key) => Ok(entries
                .get(key.to_string().as_str())
                .cloned()
                .unwrap_or_default()),
            (Self::Object(object), key) => object.read_keyed(key),
            (receiver, key) => Err(ValueError::UnknownField {
                type_name: receiver.kind().to_owned(),
                name: key.to_string(),
            }),
        }
    }

    /// Calls a named method on this value.
    ///
    /// Objects delegate to [`Reflect::invoke`]; maps call a function-valued
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::NotCallable`] if the member exists but is not a
    /// function, or whatever the function itself returns.
    pub fn invoke(&self, name: &str, args: &[Self]) -> Result<Self, ValueError> {
        match self {
            Self::Object(object) => object.invoke(name, args),
            other => match other.read_field(name)? {
                Self::Function(f) => f.call(args),
                found => Err(ValueError::NotCallable {
                    name: name.to_owned(),
                    kind: found.kind(),
                }),
            },
        }
    }

    /// Converts to JSON.
    ///
    /// Non-finite floats and functions become `null`; objects export their
    /// [`Reflect::fields`].
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Self::Null | Self::Function(_) => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::Str(s) => Json::String(s.to_string()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Object(object) => Json::Object(
                object
                    .fields()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_with(other, false)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_nan() => f.write_str("NaN"),
            Self::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Object(object) => write!(f, "[object {}]", object.type_name()),
            Self::Function(_) => f.write_str("function"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or(Self::Float(n as f64), Self::Int)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::from(items))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(Rc::new(entries))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Json::String(s) => Self::from(s),
            Json::Array(items) => items.into_iter().map(Self::from).collect::<Vec<_>>().into(),
            Json::Object(entries) => entries
                .into_iter()
                .map(|(k, v)| (k, Self::from(v)))
                .collect::<BTreeMap<_, _>>()
                .into(),
        }
    }
}
