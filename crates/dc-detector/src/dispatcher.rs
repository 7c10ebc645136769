//! The consumer side of change detection.
//!
//! A detector reports changed bindings to its [`ChangeDispatcher`] once per
//! contiguous run of same-group changes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use dc_core::{BindingId, GroupId, Value};

use crate::error::BoxError;

/// A record's cached value.
///
/// `Uninitialized` is distinct from [`Value::Null`]: a record that has never
/// been evaluated always counts as changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SlotValue {
    /// Not evaluated since the detector was hydrated.
    #[default]
    Uninitialized,
    /// The value seen by the last pass.
    Set(Value),
}

impl SlotValue {
    /// Returns the cached value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Uninitialized => None,
            Self::Set(value) => Some(value),
        }
    }

    /// Returns `true` if `current` differs from the cached value.
    #[must_use]
    pub fn differs_from(&self, current: &Value) -> bool {
        self.value().is_none_or(|previous| !previous.loose_identical(current))
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("<uninitialized>"),
            Self::Set(value) => write!(f, "{value}"),
        }
    }
}

/// One changed binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// The binding that changed.
    pub binding_id: BindingId,
    /// The value cached before this pass.
    pub previous_value: SlotValue,
    /// The newly evaluated value.
    pub current_value: Value,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.binding_id, self.current_value)
    }
}

/// Receives grouped change notifications.
pub trait ChangeDispatcher {
    /// Called once per flushed group with its changes in evaluation order.
    fn on_record_change(&mut self, group: &GroupId, changes: &[ChangeRecord]) -> Result<(), BoxError>;
}

impl<D: ChangeDispatcher + ?Sized> ChangeDispatcher for Box<D> {
    fn on_record_change(&mut self, group: &GroupId, changes: &[ChangeRecord]) -> Result<(), BoxError> {
        (**self).on_record_change(group, changes)
    }
}

/// Shares a dispatcher with the code that inspects it.
impl<D: ChangeDispatcher> ChangeDispatcher for Rc<RefCell<D>> {
    fn on_record_change(&mut self, group: &GroupId, changes: &[ChangeRecord]) -> Result<(), BoxError> {
        self.try_borrow_mut()?.on_record_change(group, changes)
    }
}

/// Dispatcher that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

impl ChangeDispatcher for NullDispatcher {
    fn on_record_change(&mut self, _group: &GroupId, _changes: &[ChangeRecord]) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A flushed group as recorded by [`ChangeLog`].
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// The group that was flushed.
    pub group: GroupId,
    /// Its changes.
    pub changes: Vec<ChangeRecord>,
}

/// Dispatcher that records every notification in order.
///
/// # Examples
///
/// ```
/// use dc_detector::{ChangeDispatcher, ChangeLog, ChangeRecord, SlotValue};
///
/// let mut log = ChangeLog::default();
/// let change = ChangeRecord {
///     binding_id: "name".into(),
///     previous_value: SlotValue::Uninitialized,
///     current_value: "misko".into(),
/// };
/// log.on_record_change(&"1".into(), &[change]).unwrap();
/// assert_eq!(log.take_values(), vec!["name=misko"]);
/// assert!(log.is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ChangeLog {
    notifications: Vec<Notification>,
}

impl ChangeLog {
    /// The notifications received so far.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Returns `true` if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Drains the log.
    pub fn take(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Drains the log into `binding=value` strings, flattened across groups.
    pub fn take_values(&mut self) -> Vec<String> {
        self.take()
            .iter()
            .flat_map(|notification| &notification.changes)
            .map(ToString::to_string)
            .collect()
    }
}

impl ChangeDispatcher for ChangeLog {
    fn on_record_change(&mut self, group: &GroupId, changes: &[ChangeRecord]) -> Result<(), BoxError> {
        self.notifications.push(Notification {
            group: group.clone(),
            changes: changes.to_vec(),
        });
        Ok(())
    }
}
