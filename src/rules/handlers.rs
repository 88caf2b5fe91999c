//! Named validator and side-effect implementations.
//!
//! Rules refer to these by name; the implementations themselves are
//! registered once on the engine. Closures can be adapted with
//! [`validator_fn`] and [`side_effect_fn`].

use crate::core::TransitionContext;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Boxed error returned by validators and side effects.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Decides whether a matched transition may proceed.
///
/// Returning `Ok(false)` rejects the transition. An `Err` is treated the
/// same as a rejection and reported as a validator failure.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, ctx: &TransitionContext) -> Result<bool, HandlerError>;
}

/// Work performed after validation passes and before the transition is
/// recorded. A failure aborts the transition.
#[async_trait]
pub trait SideEffect: Send + Sync {
    async fn apply(&self, ctx: &TransitionContext) -> Result<(), HandlerError>;
}

/// Validator backed by an async closure.
pub struct FnValidator<F>(F);

#[async_trait]
impl<F, Fut> Validator for FnValidator<F>
where
    F: Fn(TransitionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, HandlerError>> + Send,
{
    async fn validate(&self, ctx: &TransitionContext) -> Result<bool, HandlerError> {
        (self.0)(ctx.clone()).await
    }
}

/// Side effect backed by an async closure.
pub struct FnSideEffect<F>(F);

#[async_trait]
impl<F, Fut> SideEffect for FnSideEffect<F>
where
    F: Fn(TransitionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn apply(&self, ctx: &TransitionContext) -> Result<(), HandlerError> {
        (self.0)(ctx.clone()).await
    }
}

/// Wrap an async closure as a [`Validator`].
///
/// # Example
///
/// ```rust
/// use statusflow::rules::validator_fn;
///
/// let has_owner = validator_fn(|ctx| async move {
///     Ok(ctx.metadata.contains_key("owner"))
/// });
/// ```
pub fn validator_fn<F, Fut>(f: F) -> Arc<dyn Validator>
where
    F: Fn(TransitionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
{
    Arc::new(FnValidator(f))
}

/// Wrap an async closure as a [`SideEffect`].
pub fn side_effect_fn<F, Fut>(f: F) -> Arc<dyn SideEffect>
where
    F: Fn(TransitionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnSideEffect(f))
}
