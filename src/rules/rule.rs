//! Declarative transition rules.

use super::handlers::{SideEffect, Validator};
use crate::core::{StatusSet, StatusValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One allowed status-change edge for an entity kind.
///
/// Rules name their validator and side effect instead of holding them, so
/// a rule set can be inspected, compared and loaded from JSON.
///
/// # Example
///
/// ```rust
/// use statusflow::rules::TransitionRule;
///
/// let rule = TransitionRule::new("start", "TODO", "DOING").validated_by("has_owner");
///
/// assert!(rule.matches(&"TODO".into(), &"DOING".into()));
/// assert!(!rule.matches(&"DOING".into(), &"DONE".into()));
/// assert_eq!(rule.validator.as_deref(), Some("has_owner"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub name: String,
    pub from: StatusSet,
    pub to: StatusSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effect: Option<String>,
    /// Overrides the engine's validation timeout for this rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TransitionRule {
    pub fn new(
        name: impl Into<String>,
        from: impl Into<StatusSet>,
        to: impl Into<StatusSet>,
    ) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            validator: None,
            side_effect: None,
            timeout_ms: None,
        }
    }

    pub fn validated_by(mut self, validator: impl Into<String>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    pub fn with_side_effect(mut self, side_effect: impl Into<String>) -> Self {
        self.side_effect = Some(side_effect.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Check whether this rule covers the `current -> target` edge.
    pub fn matches(&self, current: &StatusValue, target: &StatusValue) -> bool {
        self.from.contains(current) && self.to.contains(target)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// A rule with its named handlers resolved against the registry.
#[derive(Clone)]
pub struct BoundRule {
    pub rule: TransitionRule,
    pub validator: Option<Arc<dyn Validator>>,
    pub side_effect: Option<Arc<dyn SideEffect>>,
}

impl BoundRule {
    pub fn name(&self) -> &str {
        &self.rule.name
    }

    pub fn matches(&self, current: &StatusValue, target: &StatusValue) -> bool {
        self.rule.matches(current, target)
    }
}

impl std::fmt::Debug for BoundRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundRule")
            .field("rule", &self.rule)
            .field("has_validator", &self.validator.is_some())
            .field("has_side_effect", &self.side_effect.is_some())
            .finish()
    }
}
