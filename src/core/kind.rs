//! Entity kinds and the composite key identifying one entity instance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of state-owning object the engine manages transitions for.
///
/// The set is closed: every rule set, history log and exclusion key is
/// scoped to one of these kinds.
///
/// # Example
///
/// ```rust
/// use statusflow::core::EntityKind;
///
/// let kind: EntityKind = "task".parse().unwrap();
/// assert_eq!(kind, EntityKind::Task);
/// assert_eq!(kind.to_string(), "task");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Agent,
    Task,
    Workflow,
    Message,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 4] = [Self::Agent, Self::Task, Self::Workflow, Self::Message];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Task => "task",
            Self::Workflow => "workflow",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown entity kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown entity kind '{0}'")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "task" => Ok(Self::Task),
            "workflow" => Ok(Self::Workflow),
            "message" => Ok(Self::Message),
            _ => Err(UnknownEntityKind(s.to_string())),
        }
    }
}

/// Composite `(kind, id)` key for a single entity instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
