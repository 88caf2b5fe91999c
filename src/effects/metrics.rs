//! Transition counters fed from the notification bus.

use crate::core::{EntityKind, StatusValue};
use crate::effects::bus::{ChangeEvent, Subscriber};
use crate::rules::HandlerError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

type Edge = (EntityKind, StatusValue, StatusValue);

/// Counts completed transitions per kind and per `(from, to)` edge.
///
/// Subscribe it like any other [`Subscriber`]:
///
/// ```rust
/// use statusflow::effects::TransitionMetrics;
/// use statusflow::TransitionEngine;
/// use std::sync::Arc;
///
/// let engine = TransitionEngine::with_defaults();
/// let metrics = Arc::new(TransitionMetrics::new());
/// let _subscription = engine.subscribe(metrics.clone());
/// assert_eq!(metrics.total(), 0);
/// ```
#[derive(Debug, Default)]
pub struct TransitionMetrics {
    edges: Mutex<HashMap<Edge, u64>>,
}

impl TransitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    pub fn by_kind(&self, kind: EntityKind) -> u64 {
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn edge(&self, kind: EntityKind, from: &str, to: &str) -> u64 {
        let key = (kind, StatusValue::from(from), StatusValue::from(to));
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset(&self) {
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl Subscriber for TransitionMetrics {
    async fn on_event(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        let key = (
            event.entity_kind,
            event.previous_status.clone(),
            event.new_status.clone(),
        );
        *self
            .edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(0) += 1;
        Ok(())
    }
}
