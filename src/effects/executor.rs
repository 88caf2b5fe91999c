//! Transition engine: exclusion, validation, side effects, history and notification.

use crate::builder::{BuildError, EngineBuilder};
use crate::config::{ConcurrencyPolicy, EngineConfig};
use crate::core::{EntityKey, EntityKind, HistoryEntry, StatusValue, TransitionContext};
use crate::effects::bus::{ChangeEvent, NotificationBus, Subscriber, Subscription};
use crate::effects::error::{SideEffectFailure, TransitionError};
use crate::effects::exclusion::{ExclusionGuard, ExclusionPermit};
use crate::effects::store::HistoryStore;
use crate::enforcement::pipeline::panic_message;
use crate::enforcement::{ValidationFailure, ValidationPipeline};
use crate::rules::{BoundRule, RegistryError, RuleRegistry, SideEffect, TransitionRule, Validator};
use futures_util::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

/// Governs status changes for agents, tasks, workflows and messages.
///
/// The engine never stores an entity's current status. Callers own that
/// field on their own records and call [`transition`](Self::transition) as
/// the gate around every change to it.
///
/// A transition runs these steps in order:
/// 1. Claim the entity's exclusion key (per [`ConcurrencyPolicy`])
/// 2. Validate against every matching rule
/// 3. Run matched side effects sequentially, in registration order
/// 4. Record a history entry and publish a [`ChangeEvent`]
/// 5. Release the key, on every path
///
/// # Example
///
/// ```rust
/// use statusflow::core::{EntityKind, TransitionContext};
/// use statusflow::rules::TransitionRule;
/// use statusflow::TransitionEngine;
///
/// # tokio_test();
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn tokio_test() {
/// let engine = TransitionEngine::with_defaults();
/// engine
///     .register_rules(EntityKind::Task, vec![TransitionRule::new("start", "TODO", "DOING")])
///     .unwrap();
///
/// let ctx = TransitionContext::new(EntityKind::Task, "t1", "TODO", "DOING");
/// let event = engine.transition(ctx).await.unwrap();
/// assert_eq!(event.new_status, "DOING");
///
/// let ctx = TransitionContext::new(EntityKind::Task, "t1", "DOING", "DONE");
/// assert!(engine.transition(ctx).await.unwrap_err().is_invalid());
/// assert_eq!(engine.get_history("t1").len(), 1);
/// # }
/// ```
pub struct TransitionEngine {
    config: EngineConfig,
    registry: RuleRegistry,
    pipeline: ValidationPipeline,
    exclusion: ExclusionGuard,
    history: HistoryStore,
    bus: NotificationBus,
}

impl TransitionEngine {
    /// Create an engine with no rules from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, BuildError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    /// Engine with the default configuration.
    pub fn with_defaults() -> Self {
        Self::from_config(EngineConfig::default())
    }

    fn from_config(config: EngineConfig) -> Self {
        Self {
            pipeline: ValidationPipeline::new(config.validation_timeout()),
            history: HistoryStore::new(config.max_history_length),
            registry: RuleRegistry::new(),
            exclusion: ExclusionGuard::new(),
            bus: NotificationBus::new(),
            config,
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn register_validator(&self, name: impl Into<String>, validator: Arc<dyn Validator>) {
        self.registry.register_validator(name, validator);
    }

    pub fn register_side_effect(&self, name: impl Into<String>, side_effect: Arc<dyn SideEffect>) {
        self.registry.register_side_effect(name, side_effect);
    }

    /// Replace the rule set for `kind`.
    pub fn register_rules(
        &self,
        kind: EntityKind,
        rules: Vec<TransitionRule>,
    ) -> Result<(), RegistryError> {
        let count = rules.len();
        self.registry.register(kind, rules)?;
        tracing::debug!(kind = %kind, rules = count, "registered transition rules");
        Ok(())
    }

    /// Append to the rule set for `kind`.
    pub fn append_rules(
        &self,
        kind: EntityKind,
        rules: Vec<TransitionRule>,
    ) -> Result<(), RegistryError> {
        self.registry.append(kind, rules)
    }

    /// Whether the proposed edge is currently allowed.
    ///
    /// Runs validators but no side effects, and claims no exclusion key.
    pub async fn can_transition(&self, ctx: &TransitionContext) -> bool {
        self.validate(ctx).await.is_ok()
    }

    /// Like [`can_transition`](Self::can_transition), but reports why not.
    pub async fn validate(&self, ctx: &TransitionContext) -> Result<(), Vec<ValidationFailure>> {
        let rules = self.registry.lookup(ctx.entity_kind);
        self.pipeline.check(&rules, ctx).await
    }

    /// Execute a transition, returning the published event on success.
    ///
    /// Nothing is recorded or published unless every matched validator
    /// passed and every side effect completed.
    pub async fn transition(&self, ctx: TransitionContext) -> Result<ChangeEvent, TransitionError> {
        let key = ctx.key();
        let _permit = self.acquire(&key).await?;

        let rules = self.registry.lookup(ctx.entity_kind);
        if let Err(failures) = self.pipeline.check(&rules, &ctx).await {
            tracing::warn!(
                kind = %ctx.entity_kind,
                entity_id = %ctx.entity_id,
                from = %ctx.current_status,
                to = %ctx.target_status,
                timed_out = failures.iter().any(ValidationFailure::is_timeout),
                failures = ?failures,
                "transition rejected"
            );
            return Err(TransitionError::InvalidTransition {
                key,
                from: ctx.current_status,
                to: ctx.target_status,
                failures,
            });
        }

        for rule in ValidationPipeline::select(&rules, &ctx) {
            self.run_side_effect(rule, &ctx)
                .await
                .map_err(|source| TransitionError::SideEffect {
                    key: key.clone(),
                    rule: rule.name().to_string(),
                    source,
                })?;
        }

        let entry = HistoryEntry::from_context(Uuid::new_v4(), &ctx);
        if self.config.history_enabled {
            self.history.record(entry.clone());
        }

        // Queued while the permit is held, so one entity's events stay in order.
        let event = ChangeEvent::from(entry);
        let receipt = self.bus.publish(event.clone());

        tracing::debug!(
            kind = %ctx.entity_kind,
            entity_id = %ctx.entity_id,
            from = %ctx.current_status,
            to = %ctx.target_status,
            transition_id = %event.transition_id,
            subscribers = receipt.dispatched(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "transition completed"
        );
        Ok(event)
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> Subscription {
        self.bus.subscribe(subscriber)
    }

    /// History for `entity_id` across all kinds, oldest first.
    pub fn get_history(&self, entity_id: &str) -> Vec<HistoryEntry> {
        self.history.query_id(entity_id)
    }

    /// History for one `(kind, id)` instance, oldest first.
    pub fn get_entity_history(&self, kind: EntityKind, entity_id: &str) -> Vec<HistoryEntry> {
        self.history.query(kind, entity_id)
    }

    pub fn clear_history(&self, kind: Option<EntityKind>, entity_id: Option<&str>) {
        self.history.clear(kind, entity_id);
    }

    /// Instances of `kind` counted by the status of their latest history entry.
    pub fn get_status_counts(&self, kind: EntityKind) -> BTreeMap<StatusValue, usize> {
        self.history.status_counts(kind)
    }

    /// Whether a transition currently holds this instance's exclusion key.
    pub fn is_in_flight(&self, kind: EntityKind, entity_id: &str) -> bool {
        self.exclusion.is_busy(&EntityKey::new(kind, entity_id))
    }

    async fn acquire(
        &self,
        key: &EntityKey,
    ) -> Result<Option<ExclusionPermit<'_>>, TransitionError> {
        match self.config.concurrency {
            ConcurrencyPolicy::Allow => Ok(None),
            ConcurrencyPolicy::Queue => Ok(Some(self.exclusion.claim(key.clone()).await)),
            ConcurrencyPolicy::Reject => match self.exclusion.try_claim(key.clone()) {
                Some(permit) => Ok(Some(permit)),
                None => {
                    tracing::warn!(
                        kind = %key.kind,
                        entity_id = %key.id,
                        "transition already in flight"
                    );
                    Err(TransitionError::ConcurrentTransition { key: key.clone() })
                }
            },
        }
    }

    async fn run_side_effect(
        &self,
        rule: &BoundRule,
        ctx: &TransitionContext,
    ) -> Result<(), SideEffectFailure> {
        let Some(effect) = &rule.side_effect else {
            return Ok(());
        };

        let call = AssertUnwindSafe(effect.apply(ctx)).catch_unwind();
        let outcome = match self.config.side_effect_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SideEffectFailure::TimedOut(limit)),
            None => Ok(call.await),
        };

        let result = match outcome {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(SideEffectFailure::Failed(e)),
            Ok(Err(panic)) => Err(SideEffectFailure::Panicked(panic_message(panic.as_ref()))),
            Err(timed_out) => Err(timed_out),
        };

        if let Err(failure) = &result {
            tracing::error!(
                kind = %ctx.entity_kind,
                entity_id = %ctx.entity_id,
                from = %ctx.current_status,
                to = %ctx.target_status,
                rule = %rule.name(),
                error = %failure,
                "side effect failed, transition aborted"
            );
        }
        result
    }
}
