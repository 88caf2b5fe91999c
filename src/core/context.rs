//! Context describing one proposed transition.

use super::kind::{EntityKey, EntityKind};
use super::status::StatusValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Free-form metadata carried through validators, side effects, history and events.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A proposed status change for one entity instance.
///
/// Built fresh for every call and handed by reference to validators and
/// side effects. The engine never stores it.
///
/// # Example
///
/// ```rust
/// use statusflow::core::{EntityKind, TransitionContext};
///
/// let ctx = TransitionContext::new(EntityKind::Task, "t1", "TODO", "DOING")
///     .with_metadata("assignee", "agent-7");
///
/// assert_eq!(ctx.current_status, "TODO");
/// assert_eq!(ctx.metadata["assignee"], "agent-7");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub current_status: StatusValue,
    pub target_status: StatusValue,
    #[serde(default)]
    pub metadata: Metadata,
    pub requested_at: DateTime<Utc>,
}

impl TransitionContext {
    pub fn new(
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        current_status: impl Into<StatusValue>,
        target_status: impl Into<StatusValue>,
    ) -> Self {
        Self {
            entity_kind,
            entity_id: entity_id.into(),
            current_status: current_status.into(),
            target_status: target_status.into(),
            metadata: Metadata::new(),
            requested_at: Utc::now(),
        }
    }

    /// Attach one metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Key used for exclusion and history.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_kind, self.entity_id.clone())
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.requested_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_combines_kind_and_id() {
        let ctx = TransitionContext::new(EntityKind::Workflow, "wf-9", "A", "B");
        assert_eq!(ctx.key(), EntityKey::new(EntityKind::Workflow, "wf-9"));
    }

    #[test]
    fn elapsed_is_never_negative() {
        let mut ctx = TransitionContext::new(EntityKind::Task, "t1", "A", "B");
        ctx.requested_at = Utc::now() + chrono::Duration::seconds(30);
        assert_eq!(ctx.elapsed(), Duration::ZERO);

        ctx.requested_at = Utc::now() - chrono::Duration::seconds(5);
        assert!(ctx.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn metadata_accumulates() {
        let ctx = TransitionContext::new(EntityKind::Agent, "a1", "idle", "busy")
            .with_metadata("reason", "assigned")
            .with_metadata("attempt", 2);

        assert_eq!(ctx.metadata.len(), 2);
        assert_eq!(ctx.metadata["attempt"], 2);
    }
}
