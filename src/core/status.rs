//! Opaque status values and the one-or-many sets rules match against.
//!
//! The engine never interprets a status. Values are compared for equality
//! only; their meaning belongs to whoever authors the rule set.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A status value scoped to an [`EntityKind`](super::EntityKind).
///
/// # Example
///
/// ```rust
/// use statusflow::core::StatusValue;
///
/// let todo = StatusValue::from("TODO");
/// assert_eq!(todo.as_str(), "TODO");
/// assert_eq!(todo, "TODO");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusValue(String);

impl StatusValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for StatusValue {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StatusValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StatusValue {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// The `from` or `to` side of a rule: a single status or a set of them.
///
/// Serializes as a plain string for `One` and as an array for `Any`, so
/// rule files read naturally either way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusSet {
    One(StatusValue),
    Any(Vec<StatusValue>),
}

impl StatusSet {
    /// Check whether `status` is a member of this set.
    pub fn contains(&self, status: &StatusValue) -> bool {
        match self {
            Self::One(value) => value == status,
            Self::Any(values) => values.contains(status),
        }
    }

    /// Iterate over the members of the set.
    pub fn iter(&self) -> impl Iterator<Item = &StatusValue> {
        let slice: &[StatusValue] = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Any(values) => values.as_slice(),
        };
        slice.iter()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Any(values) if values.is_empty())
    }
}

impl From<&str> for StatusSet {
    fn from(value: &str) -> Self {
        Self::One(value.into())
    }
}

impl From<StatusValue> for StatusSet {
    fn from(value: StatusValue) -> Self {
        Self::One(value)
    }
}

impl<const N: usize> From<[&str; N]> for StatusSet {
    fn from(values: [&str; N]) -> Self {
        Self::Any(values.iter().map(|v| StatusValue::from(*v)).collect())
    }
}

impl From<Vec<StatusValue>> for StatusSet {
    fn from(values: Vec<StatusValue>) -> Self {
        Self::Any(values)
    }
}

impl fmt::Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(value) => write!(f, "{value}"),
            Self::Any(values) => {
                let names: Vec<&str> = values.iter().map(StatusValue::as_str).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}
