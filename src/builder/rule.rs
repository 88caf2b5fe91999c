//! Builder for constructing transition rules.

use crate::builder::error::BuildError;
use crate::core::{StatusSet, StatusValue};
use crate::rules::TransitionRule;
use std::time::Duration;

/// Builder for rules whose status sets are assembled incrementally.
///
/// Calling `.from()` or `.to()` more than once adds to the set.
///
/// # Example
///
/// ```rust
/// use statusflow::builder::RuleBuilder;
///
/// let rule = RuleBuilder::new("retry")
///     .from("FAILED")
///     .from("TIMED_OUT")
///     .to("QUEUED")
///     .validator("under_retry_budget")
///     .build()
///     .unwrap();
///
/// assert!(rule.matches(&"TIMED_OUT".into(), &"QUEUED".into()));
/// ```
pub struct RuleBuilder {
    name: String,
    from: Vec<StatusValue>,
    to: Vec<StatusValue>,
    validator: Option<String>,
    side_effect: Option<String>,
    timeout: Option<Duration>,
}

impl RuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: Vec::new(),
            to: Vec::new(),
            validator: None,
            side_effect: None,
            timeout: None,
        }
    }

    /// Add a source status (required at least once).
    pub fn from(mut self, status: impl Into<StatusValue>) -> Self {
        self.from.push(status.into());
        self
    }

    /// Add a target status (required at least once).
    pub fn to(mut self, status: impl Into<StatusValue>) -> Self {
        self.to.push(status.into());
        self
    }

    /// Name the validator to consult (optional).
    pub fn validator(mut self, name: impl Into<String>) -> Self {
        self.validator = Some(name.into());
        self
    }

    /// Name the side effect to run (optional).
    pub fn side_effect(mut self, name: impl Into<String>) -> Self {
        self.side_effect = Some(name.into());
        self
    }

    /// Override the validation timeout for this rule (optional).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<TransitionRule, BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::MissingRuleName);
        }
        let from =
            collapse(self.from).ok_or_else(|| BuildError::MissingFromStatus(self.name.clone()))?;
        let to = collapse(self.to).ok_or_else(|| BuildError::MissingToStatus(self.name.clone()))?;

        let mut rule = TransitionRule::new(self.name, from, to);
        rule.validator = self.validator;
        rule.side_effect = self.side_effect;
        if let Some(timeout) = self.timeout {
            rule = rule.with_timeout(timeout);
        }
        Ok(rule)
    }
}

fn collapse(mut statuses: Vec<StatusValue>) -> Option<StatusSet> {
    match statuses.len() {
        0 => None,
        1 => statuses.pop().map(StatusSet::One),
        _ => Some(StatusSet::Any(statuses)),
    }
}
