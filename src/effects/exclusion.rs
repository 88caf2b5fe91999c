//! Per-entity mutual exclusion for in-flight transitions.

use crate::core::EntityKey;
use std::collections::HashSet;
use std::pin::pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

/// Set of entity instances that currently have a transition in flight.
///
/// Claims are atomic and released when the returned [`ExclusionPermit`]
/// is dropped, so every exit path of a transition frees its key.
///
/// # Example
///
/// ```rust
/// use statusflow::core::{EntityKey, EntityKind};
/// use statusflow::effects::ExclusionGuard;
///
/// let guard = ExclusionGuard::new();
/// let key = EntityKey::new(EntityKind::Task, "t1");
///
/// let permit = guard.try_claim(key.clone()).expect("key is free");
/// assert!(guard.try_claim(key.clone()).is_none());
///
/// drop(permit);
/// assert!(guard.try_claim(key).is_some());
/// ```
#[derive(Debug, Default)]
pub struct ExclusionGuard {
    busy: Mutex<HashSet<EntityKey>>,
    released: Notify,
}

impl ExclusionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` if no other transition holds it.
    pub fn try_claim(&self, key: EntityKey) -> Option<ExclusionPermit<'_>> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if busy.insert(key.clone()) {
            Some(ExclusionPermit { guard: self, key })
        } else {
            None
        }
    }

    /// Claim `key`, waiting for the current holder to release it.
    ///
    /// Waiters are not served in arrival order.
    pub async fn claim(&self, key: EntityKey) -> ExclusionPermit<'_> {
        loop {
            // Register interest before checking, so a release between the
            // check and the await is not missed.
            let mut notified = pin!(self.released.notified());
            notified.as_mut().enable();

            if let Some(permit) = self.try_claim(key.clone()) {
                return permit;
            }
            notified.await;
        }
    }

    pub fn is_busy(&self, key: &EntityKey) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Number of keys currently claimed.
    pub fn busy_count(&self) -> usize {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, key: &EntityKey) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        self.released.notify_waiters();
    }
}

/// Proof of an exclusive claim on one entity key. Releases on drop.
#[derive(Debug)]
pub struct ExclusionPermit<'a> {
    guard: &'a ExclusionGuard,
    key: EntityKey,
}

impl ExclusionPermit<'_> {
    pub fn key(&self) -> &EntityKey {
        &self.key
    }
}

impl Drop for ExclusionPermit<'_> {
    fn drop(&mut self) {
        self.guard.release(&self.key);
    }
}
