//! Inbox store (C6): message-id deduplication over a sliding window plus
//! pending/processed/failed/duplicate lifecycle tracking.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::message::{Message, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxStatus {
    Pending,
    Processed,
    Failed,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct InboxEntry {
    pub id: String,
    pub message: Message,
    pub received_at: DateTime<Utc>,
    pub status: InboxStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Number of times a later `Add` observed this id as a duplicate.
    pub duplicate_observations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct AddOptions {
    pub require_idempotency: bool,
    pub window: Duration,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self { require_idempotency: true, window: crate::constants::DEFAULT_DEDUP_WINDOW }
    }
}

/// Filter recognized by [`InboxStore::query`], mirroring the outbox's but
/// keyed on `received_at`.
#[derive(Debug, Clone, Default)]
pub struct InboxQuery {
    pub status: Option<InboxStatus>,
    pub older_than: Option<DateTime<Utc>>,
    pub newer_than: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Default)]
pub struct InboxStore {
    entries: Mutex<HashMap<String, InboxEntry>>,
}

impl InboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when `opts.require_idempotency` and `message.id` already
    /// has a live entry within `opts.window`. The prior entry's
    /// duplicate-observation count is incremented, and the rejected
    /// attempt is itself recorded as a `Duplicate`-status entry so it
    /// remains visible to `query`; at most one non-`Duplicate` entry
    /// exists per id within the window.
    pub fn add(&self, message: Message, opts: AddOptions) -> Option<InboxEntry> {
        let id = message.id.to_string();
        let mut entries = self.entries.lock();

        if opts.require_idempotency {
            if let Some(existing) = entries.get_mut(&id) {
                if is_within_window(existing.received_at, opts.window, Utc::now()) {
                    existing.duplicate_observations += 1;
                    let observation = existing.duplicate_observations;
                    entries.insert(
                        format!("{id}#dup{observation}"),
                        InboxEntry {
                            id: id.clone(),
                            message,
                            received_at: Utc::now(),
                            status: InboxStatus::Duplicate,
                            processed_at: None,
                            error: None,
                            duplicate_observations: 0,
                        },
                    );
                    return None;
                }
            }
        }

        let entry = InboxEntry {
            id: id.clone(),
            message,
            received_at: Utc::now(),
            status: InboxStatus::Pending,
            processed_at: None,
            error: None,
            duplicate_observations: 0,
        };
        entries.insert(id, entry.clone());
        Some(entry)
    }

    /// True iff an entry for `id` exists with `received_at >= now - window`
    /// (inclusive boundary).
    pub fn is_duplicate(&self, id: &MessageId, window: Duration) -> bool {
        let entries = self.entries.lock();
        entries.get(&id.to_string()).map(|e| is_within_window(e.received_at, window, Utc::now())).unwrap_or(false)
    }

    pub fn mark_processed(&self, id: &MessageId) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id.to_string()) else { return false };
        if entry.status == InboxStatus::Processed {
            return false;
        }
        entry.status = InboxStatus::Processed;
        entry.processed_at = Some(Utc::now());
        true
    }

    pub fn mark_failed(&self, id: &MessageId, error: impl Into<String>) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id.to_string()) else { return false };
        if entry.status == InboxStatus::Failed {
            return false;
        }
        entry.status = InboxStatus::Failed;
        entry.error = Some(error.into());
        true
    }

    /// Removes only `Processed` entries older than `max_age`; `Failed`
    /// entries are retained for inspection.
    pub fn cleanup_old_entries(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::zero());
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !(e.status == InboxStatus::Processed && e.received_at < cutoff));
        before - entries.len()
    }

    pub fn query(&self, query: InboxQuery) -> Vec<InboxEntry> {
        let entries = self.entries.lock();
        let mut matching: Vec<InboxEntry> = entries
            .values()
            .filter(|e| query.status.map(|s| e.status == s).unwrap_or(true))
            .filter(|e| query.older_than.map(|t| e.received_at < t).unwrap_or(true))
            .filter(|e| query.newer_than.map(|t| e.received_at > t).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        matching
    }
}

fn is_within_window(received_at: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
    received_at >= now - window
}
