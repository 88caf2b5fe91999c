//! Validation of a proposed transition against its matched rules.

use crate::core::TransitionContext;
use crate::enforcement::violations::ValidationFailure;
use crate::rules::BoundRule;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Default window each validator gets before it counts as a rejection.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of validating one transition, with every failure collected.
pub type ValidationOutcome = Validation<(), NonEmptyVec<ValidationFailure>>;

/// Evaluates whether a transition is currently allowed.
///
/// Every rule matching the `current -> target` edge must pass. Matched
/// validators run concurrently and each races its own timeout; a timeout,
/// an `Err` or a panic all count as a failing validator. Rules without a
/// validator pass trivially. All failures are collected rather than
/// stopping at the first one.
#[derive(Clone, Debug)]
pub struct ValidationPipeline {
    default_timeout: Duration,
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDATION_TIMEOUT)
    }
}

impl ValidationPipeline {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Rules covering the context's edge, in registration order.
    pub fn select<'a>(rules: &'a [BoundRule], ctx: &TransitionContext) -> Vec<&'a BoundRule> {
        rules
            .iter()
            .filter(|rule| rule.matches(&ctx.current_status, &ctx.target_status))
            .collect()
    }

    /// Validate `ctx` against `rules`, accumulating all failures.
    pub async fn evaluate(
        &self,
        rules: &[BoundRule],
        ctx: &TransitionContext,
    ) -> ValidationOutcome {
        if rules.is_empty() {
            return Validation::fail(ValidationFailure::NoRulesForKind {
                kind: ctx.entity_kind,
            });
        }

        let matched = Self::select(rules, ctx);
        if matched.is_empty() {
            return Validation::fail(ValidationFailure::NoMatchingRule {
                kind: ctx.entity_kind,
                from: ctx.current_status.clone(),
                to: ctx.target_status.clone(),
            });
        }

        let checks = join_all(matched.into_iter().map(|rule| self.run_validator(rule, ctx))).await;
        Validation::all_vec(checks).map(|_| ())
    }

    /// Validate and flatten the outcome into a `Result`.
    pub async fn check(
        &self,
        rules: &[BoundRule],
        ctx: &TransitionContext,
    ) -> Result<(), Vec<ValidationFailure>> {
        match self.evaluate(rules, ctx).await {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => Err(errors.iter().cloned().collect()),
        }
    }

    async fn run_validator(&self, rule: &BoundRule, ctx: &TransitionContext) -> ValidationOutcome {
        let Some(validator) = &rule.validator else {
            return Validation::success(());
        };

        let timeout = rule.rule.timeout().unwrap_or(self.default_timeout);
        let call = AssertUnwindSafe(validator.validate(ctx)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(true))) => Validation::success(()),
            Ok(Ok(Ok(false))) => {
                tracing::debug!(
                    kind = %ctx.entity_kind,
                    entity_id = %ctx.entity_id,
                    rule = %rule.name(),
                    "validator rejected transition"
                );
                Validation::fail(ValidationFailure::Rejected {
                    rule: rule.name().to_string(),
                })
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(
                    kind = %ctx.entity_kind,
                    entity_id = %ctx.entity_id,
                    rule = %rule.name(),
                    error = %e,
                    "validator returned an error"
                );
                Validation::fail(ValidationFailure::ValidatorFailed {
                    rule: rule.name().to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(
                    kind = %ctx.entity_kind,
                    entity_id = %ctx.entity_id,
                    rule = %rule.name(),
                    panic = %message,
                    "validator panicked"
                );
                Validation::fail(ValidationFailure::ValidatorFailed {
                    rule: rule.name().to_string(),
                    message,
                })
            }
            Err(_) => {
                tracing::warn!(
                    kind = %ctx.entity_kind,
                    entity_id = %ctx.entity_id,
                    rule = %rule.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "validator timed out"
                );
                Validation::fail(ValidationFailure::TimedOut {
                    rule: rule.name().to_string(),
                    timeout,
                })
            }
        }
    }
}

/// Best-effort text from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
