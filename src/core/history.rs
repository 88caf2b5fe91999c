//! Transition history records.
//!
//! A [`HistoryEntry`] is an immutable record of one completed transition.
//! [`EntityHistory`] is the bounded, ordered log kept for a single entity
//! instance: once it reaches capacity the oldest entries are dropped first.

use super::context::{Metadata, TransitionContext};
use super::kind::EntityKind;
use super::status::StatusValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// Record of a single completed transition.
///
/// # Example
///
/// ```rust
/// use statusflow::core::{EntityKind, HistoryEntry, TransitionContext};
/// use uuid::Uuid;
///
/// let ctx = TransitionContext::new(EntityKind::Task, "t1", "TODO", "DOING");
/// let entry = HistoryEntry::from_context(Uuid::new_v4(), &ctx);
///
/// assert_eq!(entry.from, "TODO");
/// assert_eq!(entry.to, "DOING");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Identifier shared with the [`ChangeEvent`](crate::effects::ChangeEvent)
    /// of the same transition
    pub transition_id: Uuid,
    /// When the transition completed
    pub timestamp: DateTime<Utc>,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub from: StatusValue,
    pub to: StatusValue,
    pub metadata: Metadata,
}

impl HistoryEntry {
    /// Build an entry stamped with the current time.
    pub fn from_context(transition_id: Uuid, ctx: &TransitionContext) -> Self {
        Self {
            transition_id,
            timestamp: Utc::now(),
            entity_kind: ctx.entity_kind,
            entity_id: ctx.entity_id.clone(),
            from: ctx.current_status.clone(),
            to: ctx.target_status.clone(),
            metadata: ctx.metadata.clone(),
        }
    }
}

/// Bounded, ordered history of one entity instance.
///
/// # Example
///
/// ```rust
/// use statusflow::core::{EntityHistory, EntityKind, HistoryEntry, TransitionContext};
/// use uuid::Uuid;
///
/// let mut history = EntityHistory::with_capacity_limit(2);
/// for (from, to) in [("A", "B"), ("B", "C"), ("C", "D")] {
///     let ctx = TransitionContext::new(EntityKind::Task, "t1", from, to);
///     history.record(HistoryEntry::from_context(Uuid::new_v4(), &ctx));
/// }
///
/// // Oldest entry was dropped
/// assert_eq!(history.len(), 2);
/// let path: Vec<&str> = history.path().iter().map(|s| s.as_str()).collect();
/// assert_eq!(path, vec!["B", "C", "D"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityHistory {
    entries: VecDeque<HistoryEntry>,
    max_len: usize,
}

impl EntityHistory {
    /// Create an empty history holding at most `max_len` entries.
    ///
    /// A limit of zero is raised to one; an engine with history disabled
    /// never creates these.
    pub fn with_capacity_limit(max_len: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_len: max_len.max(1),
        }
    }

    /// Append an entry, trimming from the head past the limit.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_len {
            self.entries.pop_front();
        }
    }

    /// Statuses traversed: the `from` of the oldest retained entry, then
    /// the `to` of every entry in order.
    pub fn path(&self) -> Vec<&StatusValue> {
        let mut path = Vec::with_capacity(self.entries.len() + 1);
        if let Some(first) = self.entries.front() {
            path.push(&first.from);
        }
        path.extend(self.entries.iter().map(|e| &e.to));
        path
    }

    /// Time between the oldest and newest retained entries.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.entries.front()?, self.entries.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Copy of the retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}
