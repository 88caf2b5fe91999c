//! In-memory store of bounded per-entity transition histories.

use crate::core::{EntityHistory, EntityKey, EntityKind, HistoryEntry, StatusValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Bounded history logs keyed by entity instance.
///
/// Every query returns a copy; callers never see internal storage.
#[derive(Debug)]
pub struct HistoryStore {
    logs: RwLock<HashMap<EntityKey, EntityHistory>>,
    max_len: usize,
}

impl HistoryStore {
    pub fn new(max_len: usize) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            max_len,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Append an entry to its entity's log, dropping the oldest past the limit.
    pub fn record(&self, entry: HistoryEntry) {
        let key = EntityKey::new(entry.entity_kind, entry.entity_id.clone());
        self.logs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| EntityHistory::with_capacity_limit(self.max_len))
            .record(entry);
    }

    /// History of one entity instance, oldest first.
    pub fn query(&self, kind: EntityKind, entity_id: &str) -> Vec<HistoryEntry> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&EntityKey::new(kind, entity_id))
            .map(EntityHistory::snapshot)
            .unwrap_or_default()
    }

    /// History of every instance with this id, across kinds, in timestamp order.
    pub fn query_id(&self, entity_id: &str) -> Vec<HistoryEntry> {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<HistoryEntry> = logs
            .iter()
            .filter(|(key, _)| key.id == entity_id)
            .flat_map(|(_, log)| log.snapshot())
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    /// Copy of one instance's full log, including path and duration helpers.
    pub fn entity_log(&self, kind: EntityKind, entity_id: &str) -> Option<EntityHistory> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&EntityKey::new(kind, entity_id))
            .cloned()
    }

    /// Remove history.
    ///
    /// - `(None, None)` clears everything
    /// - `(Some(kind), None)` clears every instance of `kind`
    /// - `(Some(kind), Some(id))` clears one instance
    /// - `(None, Some(id))` clears `id` under every kind
    pub fn clear(&self, kind: Option<EntityKind>, entity_id: Option<&str>) {
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        match (kind, entity_id) {
            (None, None) => logs.clear(),
            (Some(kind), Some(id)) => {
                logs.remove(&EntityKey::new(kind, id));
            }
            (kind, id) => logs.retain(|key, _| {
                let kind_matches = kind.map_or(true, |k| key.kind == k);
                let id_matches = id.map_or(true, |i| key.id == i);
                !(kind_matches && id_matches)
            }),
        }
    }

    /// Count instances of `kind` by the status their latest entry moved them to.
    pub fn status_counts(&self, kind: EntityKind) -> BTreeMap<StatusValue, usize> {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for latest in logs
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter_map(|(_, log)| log.latest())
        {
            *counts.entry(latest.to.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of entity instances with retained history.
    pub fn tracked_entities(&self) -> usize {
        self.logs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransitionContext;
    use uuid::Uuid;

    fn entry(kind: EntityKind, id: &str, from: &str, to: &str) -> HistoryEntry {
        let ctx = TransitionContext::new(kind, id, from, to);
        HistoryEntry::from_context(Uuid::new_v4(), &ctx)
    }

    fn populated() -> HistoryStore {
        let store = HistoryStore::new(10);
        store.record(entry(EntityKind::Task, "t1", "TODO", "DOING"));
        store.record(entry(EntityKind::Task, "t1", "DOING", "DONE"));
        store.record(entry(EntityKind::Task, "t2", "TODO", "DOING"));
        store.record(entry(EntityKind::Agent, "t1", "idle", "busy"));
        store
    }

    #[test]
    fn query_is_scoped_to_instance() {
        let store = populated();

        assert_eq!(store.query(EntityKind::Task, "t1").len(), 2);
        assert_eq!(store.query(EntityKind::Agent, "t1").len(), 1);
        assert!(store.query(EntityKind::Workflow, "t1").is_empty());
    }

    #[test]
    fn query_id_spans_kinds_in_time_order() {
        let store = populated();
        let entries = store.query_id("t1");

        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn record_respects_limit() {
        let store = HistoryStore::new(2);
        for i in 0..5 {
            store.record(entry(EntityKind::Task, "t1", &i.to_string(), &(i + 1).to_string()));
        }

        let entries = store.query(EntityKind::Task, "t1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].to, "5");
    }

    #[test]
    fn clear_instance() {
        let store = populated();
        store.clear(Some(EntityKind::Task), Some("t1"));

        assert!(store.query(EntityKind::Task, "t1").is_empty());
        assert_eq!(store.query(EntityKind::Task, "t2").len(), 1);
        assert_eq!(store.query(EntityKind::Agent, "t1").len(), 1);
    }

    #[test]
    fn clear_kind() {
        let store = populated();
        store.clear(Some(EntityKind::Task), None);

        assert_eq!(store.tracked_entities(), 1);
        assert_eq!(store.query(EntityKind::Agent, "t1").len(), 1);
    }

    #[test]
    fn clear_id_across_kinds() {
        let store = populated();
        store.clear(None, Some("t1"));

        assert!(store.query_id("t1").is_empty());
        assert_eq!(store.query(EntityKind::Task, "t2").len(), 1);
    }

    #[test]
    fn clear_everything() {
        let store = populated();
        store.clear(None, None);
        assert_eq!(store.tracked_entities(), 0);
    }

    #[test]
    fn status_counts_use_latest_entry() {
        let store = populated();
        let counts = store.status_counts(EntityKind::Task);

        assert_eq!(counts.get("DONE"), Some(&1));
        assert_eq!(counts.get("DOING"), Some(&1));
        assert_eq!(counts.len(), 2);
        assert!(store.status_counts(EntityKind::Message).is_empty());
    }

    #[test]
    fn entity_log_exposes_path() {
        let store = populated();
        let log = store.entity_log(EntityKind::Task, "t1").unwrap();

        let path: Vec<&str> = log.path().into_iter().map(StatusValue::as_str).collect();
        assert_eq!(path, vec!["TODO", "DOING", "DONE"]);
    }
}
