//! Per-kind rule storage and named handler lookup.

use super::handlers::{SideEffect, Validator};
use super::rule::{BoundRule, TransitionRule};
use crate::core::EntityKind;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Errors raised while registering rules.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Rule '{rule}' references unknown validator '{validator}'")]
    UnknownValidator { rule: String, validator: String },

    #[error("Rule '{rule}' references unknown side effect '{side_effect}'")]
    UnknownSideEffect { rule: String, side_effect: String },

    #[error("Rule '{rule}' has an empty {side} status set")]
    EmptyStatusSet { rule: String, side: &'static str },
}

/// Rule sets by entity kind, plus the named validators and side effects
/// those rules refer to.
///
/// Lookups hand out an `Arc` snapshot of a kind's rules. Replacing a rule
/// set never changes the rules an in-flight transition already holds.
#[derive(Default)]
pub struct RuleRegistry {
    rules: RwLock<HashMap<EntityKind, Arc<[BoundRule]>>>,
    validators: RwLock<HashMap<String, Arc<dyn Validator>>>,
    side_effects: RwLock<HashMap<String, Arc<dyn SideEffect>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a validator available to rules under `name`.
    pub fn register_validator(&self, name: impl Into<String>, validator: Arc<dyn Validator>) {
        self.validators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), validator);
    }

    /// Make a side effect available to rules under `name`.
    pub fn register_side_effect(&self, name: impl Into<String>, side_effect: Arc<dyn SideEffect>) {
        self.side_effects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), side_effect);
    }

    /// Replace the rule set for `kind`.
    ///
    /// All handler names are resolved up front; on error nothing changes.
    pub fn register(
        &self,
        kind: EntityKind,
        rules: Vec<TransitionRule>,
    ) -> Result<(), RegistryError> {
        let bound = self.bind_all(rules)?;
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, bound.into());
        Ok(())
    }

    /// Append rules to the existing set for `kind`, keeping registration order.
    pub fn append(
        &self,
        kind: EntityKind,
        rules: Vec<TransitionRule>,
    ) -> Result<(), RegistryError> {
        let bound = self.bind_all(rules)?;
        let mut guard = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let combined: Vec<BoundRule> = guard
            .get(&kind)
            .map(|existing| existing.iter().cloned())
            .into_iter()
            .flatten()
            .chain(bound)
            .collect();
        guard.insert(kind, combined.into());
        Ok(())
    }

    /// Rules registered for `kind`, in registration order. Empty when none are.
    pub fn lookup(&self, kind: EntityKind) -> Arc<[BoundRule]> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn has_rules(&self, kind: EntityKind) -> bool {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .is_some_and(|rules| !rules.is_empty())
    }

    /// Declarative view of the rules for `kind`.
    pub fn describe(&self, kind: EntityKind) -> Vec<TransitionRule> {
        self.lookup(kind).iter().map(|b| b.rule.clone()).collect()
    }

    fn bind_all(&self, rules: Vec<TransitionRule>) -> Result<Vec<BoundRule>, RegistryError> {
        let validators = self.validators.read().unwrap_or_else(PoisonError::into_inner);
        let side_effects = self.side_effects.read().unwrap_or_else(PoisonError::into_inner);

        rules
            .into_iter()
            .map(|rule| {
                if rule.from.is_empty() || rule.to.is_empty() {
                    let side = if rule.from.is_empty() { "from" } else { "to" };
                    return Err(RegistryError::EmptyStatusSet {
                        rule: rule.name,
                        side,
                    });
                }

                let validator = match &rule.validator {
                    Some(name) => Some(validators.get(name).cloned().ok_or_else(|| {
                        RegistryError::UnknownValidator {
                            rule: rule.name.clone(),
                            validator: name.clone(),
                        }
                    })?),
                    None => None,
                };

                let side_effect = match &rule.side_effect {
                    Some(name) => Some(side_effects.get(name).cloned().ok_or_else(|| {
                        RegistryError::UnknownSideEffect {
                            rule: rule.name.clone(),
                            side_effect: name.clone(),
                        }
                    })?),
                    None => None,
                };

                Ok(BoundRule {
                    rule,
                    validator,
                    side_effect,
                })
            })
            .collect()
    }
}
