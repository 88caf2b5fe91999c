//! Builder for constructing transition engines.

use crate::builder::error::BuildError;
use crate::config::{ConcurrencyPolicy, EngineConfig};
use crate::core::EntityKind;
use crate::effects::TransitionEngine;
use crate::rules::{SideEffect, TransitionRule, Validator};
use std::sync::Arc;
use std::time::Duration;

/// Builder for a fully wired [`TransitionEngine`].
///
/// Handlers are registered before any rules, so rules may name handlers
/// added in any order on the builder.
///
/// # Example
///
/// ```rust
/// use statusflow::builder::EngineBuilder;
/// use statusflow::config::ConcurrencyPolicy;
/// use statusflow::core::EntityKind;
/// use statusflow::rules::validator_fn;
/// use statusflow::transition_rules;
/// use std::time::Duration;
///
/// let engine = EngineBuilder::new()
///     .validation_timeout(Duration::from_millis(250))
///     .concurrency(ConcurrencyPolicy::Reject)
///     .rules(
///         EntityKind::Task,
///         transition_rules![
///             "start" => { from: "TODO", to: "DOING", validator: "has_owner" },
///         ],
///     )
///     .validator("has_owner", validator_fn(|ctx| async move {
///         Ok(ctx.metadata.contains_key("owner"))
///     }))
///     .build()
///     .unwrap();
///
/// assert!(engine.registry().has_rules(EntityKind::Task));
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    validators: Vec<(String, Arc<dyn Validator>)>,
    side_effects: Vec<(String, Arc<dyn SideEffect>)>,
    rules: Vec<(EntityKind, Vec<TransitionRule>)>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            validators: Vec::new(),
            side_effects: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.config.validation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn side_effect_timeout(mut self, timeout: Duration) -> Self {
        self.config.side_effect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn max_history_length(mut self, max_len: usize) -> Self {
        self.config.max_history_length = max_len;
        self
    }

    pub fn history(mut self, enabled: bool) -> Self {
        self.config.history_enabled = enabled;
        self
    }

    pub fn concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.config.concurrency = policy;
        self
    }

    pub fn validator(mut self, name: impl Into<String>, validator: Arc<dyn Validator>) -> Self {
        self.validators.push((name.into(), validator));
        self
    }

    pub fn side_effect(
        mut self,
        name: impl Into<String>,
        side_effect: Arc<dyn SideEffect>,
    ) -> Self {
        self.side_effects.push((name.into(), side_effect));
        self
    }

    /// Add rules for `kind`. Repeated calls for the same kind append.
    pub fn rules(mut self, kind: EntityKind, rules: Vec<TransitionRule>) -> Self {
        self.rules.push((kind, rules));
        self
    }

    /// Build the engine.
    /// Returns an error for invalid configuration or unresolved handler names.
    pub fn build(self) -> Result<TransitionEngine, BuildError> {
        let engine = TransitionEngine::new(self.config)?;

        for (name, validator) in self.validators {
            engine.register_validator(name, validator);
        }
        for (name, side_effect) in self.side_effects {
            engine.register_side_effect(name, side_effect);
        }
        for (kind, rules) in self.rules {
            engine.append_rules(kind, rules)?;
        }

        Ok(engine)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
