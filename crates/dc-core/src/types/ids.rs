//! Labels attached to binding records.
//!
//! A [`BindingId`] names a single watched expression in error messages and
//! change records. A [`GroupId`] batches consecutive records into one
//! dispatcher notification.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! label_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new label.
            #[inline]
            pub fn new(label: impl Into<String>) -> Self {
                Self(label.into())
            }

            /// Returns the label text.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(label: &str) -> Self {
                Self(label.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(label: String) -> Self {
                Self(label)
            }
        }

        impl From<u32> for $name {
            fn from(label: u32) -> Self {
                Self(label.to_string())
            }
        }
    };
}

label_type!(
    /// Descriptive label of a binding record.
    ///
    /// Purely informational: it is passed back to the dispatcher in every
    /// change record and appears in error messages.
    ///
    /// ```
    /// use dc_core::BindingId;
    ///
    /// let id = BindingId::from("name");
    /// assert_eq!(id.to_string(), "name");
    /// ```
    BindingId
);

label_type!(
    /// Batching key of a binding record.
    ///
    /// Records with equal, consecutive group ids form one change group.
    ///
    /// ```
    /// use dc_core::GroupId;
    ///
    /// assert_eq!(GroupId::from(1), GroupId::from("1"));
    /// ```
    GroupId
);
