//! Outbox store (C5): pending/processing/processed/failed lifecycle with
//! retry scheduling and priority ordering for at-least-once delivery.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::message::Message;

/// Identity of an outbox entry, distinct from the wrapped message's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutboxId(Uuid);

impl OutboxId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for OutboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: OutboxId,
    pub message: Message,
    pub created_at: DateTime<Utc>,
    pub status: OutboxStatus,
    pub priority: i32,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Filter recognized by [`OutboxStore::get_pending`].
#[derive(Debug, Clone, Default)]
pub struct OutboxQuery {
    pub status: Option<OutboxStatus>,
    pub older_than: Option<DateTime<Utc>>,
    pub newer_than: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Default)]
pub struct OutboxStore {
    entries: Mutex<HashMap<OutboxId, OutboxEntry>>,
}

impl OutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, message: Message, priority: i32, max_retries: u32) -> OutboxEntry {
        let entry = OutboxEntry {
            id: OutboxId::new(),
            message,
            created_at: Utc::now(),
            status: OutboxStatus::Pending,
            priority,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            processed_at: None,
            last_error: None,
        };
        self.entries.lock().insert(entry.id, entry.clone());
        entry
    }

    /// Entries matching `query` (default status `Pending`) whose
    /// `next_retry_at` has elapsed or is unset, ordered ascending by
    /// priority then `created_at`, honoring `limit`.
    pub fn get_pending(&self, query: OutboxQuery) -> Vec<OutboxEntry> {
        let now = Utc::now();
        let wanted_status = query.status.unwrap_or(OutboxStatus::Pending);
        let entries = self.entries.lock();

        let mut matching: Vec<OutboxEntry> = entries
            .values()
            .filter(|e| e.status == wanted_status)
            .filter(|e| e.next_retry_at.map(|at| at <= now).unwrap_or(true))
            .filter(|e| query.older_than.map(|t| e.created_at < t).unwrap_or(true))
            .filter(|e| query.newer_than.map(|t| e.created_at > t).unwrap_or(true))
            .cloned()
            .collect();

        matching.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.created_at.cmp(&b.created_at)));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        matching
    }

    /// Atomically set `retry_count` (and `next_retry_at`); transitions to
    /// `Failed` once `retry_count >= max_retries`. `false` if unknown.
    pub fn update_retry_count(&self, id: OutboxId, retry_count: u32, next_retry_at: Option<DateTime<Utc>>) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id) else { return false };
        entry.retry_count = retry_count;
        entry.next_retry_at = next_retry_at;
        if retry_count >= entry.max_retries {
            entry.status = OutboxStatus::Failed;
        } else {
            entry.status = OutboxStatus::Pending;
        }
        true
    }

    pub fn mark_processing(&self, id: OutboxId) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id) else { return false };
        if entry.status != OutboxStatus::Pending {
            return false;
        }
        entry.status = OutboxStatus::Processing;
        true
    }

    /// Idempotent terminal transition: the second call returns `false`.
    pub fn mark_processed(&self, id: OutboxId) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id) else { return false };
        if entry.status == OutboxStatus::Processed {
            return false;
        }
        entry.status = OutboxStatus::Processed;
        entry.processed_at = Some(Utc::now());
        true
    }

    /// Idempotent terminal transition: the second call returns `false`.
    pub fn mark_failed(&self, id: OutboxId, error: impl Into<String>) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id) else { return false };
        if entry.status == OutboxStatus::Failed {
            return false;
        }
        entry.status = OutboxStatus::Failed;
        entry.last_error = Some(error.into());
        true
    }

    pub fn get(&self, id: OutboxId) -> Option<OutboxEntry> {
        self.entries.lock().get(&id).cloned()
    }

    /// Drop `Processed` entries older than `max_age`, returning the
    /// count removed. `Failed` entries are retained for inspection.
    pub fn cleanup_old_entries(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !(entry.status == OutboxStatus::Processed && entry.created_at < cutoff));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::command("order.place", vec![])
    }

    #[test]
    fn get_pending_orders_by_priority_then_age() {
        let store = OutboxStore::new();
        let low = store.add(message(), 10, 3);
        let high = store.add(message(), 0, 3);
        let pending = store.get_pending(OutboxQuery::default());
        assert_eq!(pending[0].id, high.id);
        assert_eq!(pending[1].id, low.id);
    }

    #[test]
    fn retry_count_exhaustion_moves_to_failed() {
        let store = OutboxStore::new();
        let entry = store.add(message(), 0, 2);
        assert!(store.update_retry_count(entry.id, 2, None));
        assert_eq!(store.get(entry.id).unwrap().status, OutboxStatus::Failed);
    }

    #[test]
    fn future_next_retry_at_excludes_from_pending() {
        let store = OutboxStore::new();
        let entry = store.add(message(), 0, 3);
        store.update_retry_count(entry.id, 1, Some(Utc::now() + chrono::Duration::hours(1)));
        assert!(store.get_pending(OutboxQuery::default()).is_empty());
    }

    #[test]
    fn mark_processed_is_idempotent() {
        let store = OutboxStore::new();
        let entry = store.add(message(), 0, 3);
        assert!(store.mark_processed(entry.id));
        assert!(!store.mark_processed(entry.id));
    }

    #[test]
    fn unknown_id_operations_return_false() {
        let store = OutboxStore::new();
        let ghost = OutboxId::new();
        assert!(!store.mark_processed(ghost));
        assert!(!store.mark_failed(ghost, "boom"));
        assert!(!store.update_retry_count(ghost, 1, None));
    }

    #[test]
    fn cleanup_drops_old_processed_but_keeps_failed() {
        let store = OutboxStore::new();
        let processed = store.add(message(), 0, 3);
        let failed = store.add(message(), 0, 3);
        store.mark_processed(processed.id);
        store.mark_failed(failed.id, "boom");

        assert_eq!(store.cleanup_old_entries(chrono::Duration::zero()), 1);
        assert!(store.get(processed.id).is_none());
        assert!(store.get(failed.id).is_some());
    }
}
