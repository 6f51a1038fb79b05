//! Bounded FIFO with priority ordering, delayed visibility, and a
//! configurable drop-on-full policy (C3).

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{HeroMessagingError, Result};
use crate::queue::entry::{EnqueueOptions, EntryId, QueueEntry, QueueOptions};

/// A single named queue's storage and blocking discipline.
///
/// Priority convention: lower `priority` values are dequeued first
/// (priority 0 outranks priority 10); within one priority, FIFO by
/// `enqueued_at`.
pub struct ChannelQueue<T> {
    options: QueueOptions,
    entries: Mutex<Vec<QueueEntry<T>>>,
    space_available: Notify,
}

impl<T: Clone> ChannelQueue<T> {
    pub fn new(options: QueueOptions) -> Self {
        Self { options, entries: Mutex::new(Vec::new()), space_available: Notify::new() }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Enqueue `message`. If the queue is at capacity: drops the oldest
    /// entry when `drop_when_full`, otherwise suspends until space frees
    /// up or `cancel` fires.
    pub async fn enqueue(
        &self,
        message: T,
        options: EnqueueOptions,
        cancel: &CancellationToken,
    ) -> Result<QueueEntry<T>> {
        loop {
            {
                let mut entries = self.entries.lock();
                if entries.len() < self.options.max_length {
                    let entry = QueueEntry::new(message, options);
                    entries.push(entry.clone());
                    return Ok(entry);
                }
                if self.options.drop_when_full {
                    let oldest_index = entries
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, e)| e.enqueued_at)
                        .map(|(i, _)| i)
                        .expect("non-empty: len == max_length > 0 checked above");
                    entries.remove(oldest_index);
                    let entry = QueueEntry::new(message, options);
                    entries.push(entry.clone());
                    return Ok(entry);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(HeroMessagingError::Cancelled),
                _ = self.space_available.notified() => {}
            }
        }
    }

    /// Dequeue the highest-priority (lowest number), oldest,
    /// currently-visible entry.
    pub fn dequeue(&self) -> Option<QueueEntry<T>> {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let index = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_visible(now, self.options.max_dequeue_count))
            .min_by(|(_, a), (_, b)| {
                a.priority.cmp(&b.priority).then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
            })
            .map(|(i, _)| i)?;

        let entry = &mut entries[index];
        entry.dequeue_count += 1;
        entry.visible_at = now
            + chrono::Duration::from_std(self.options.visibility_timeout).unwrap_or_else(|_| chrono::Duration::zero());
        Some(entry.clone())
    }

    /// Up to `count` currently-visible entries, without mutating state.
    pub fn peek(&self, count: usize) -> Vec<QueueEntry<T>> {
        let now = Utc::now();
        let entries = self.entries.lock();
        let mut visible: Vec<_> = entries
            .iter()
            .filter(|e| e.is_visible(now, self.options.max_dequeue_count))
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.enqueued_at.cmp(&b.enqueued_at)));
        visible.truncate(count);
        visible
    }

    /// Remove `id`. `false` if unknown.
    pub fn ack(&self, id: EntryId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// `requeue`: reset dequeue count and make immediately visible again.
    /// otherwise, delete. `false` if unknown.
    pub fn reject(&self, id: EntryId, requeue: bool) -> bool {
        let mut entries = self.entries.lock();
        if requeue {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                entry.dequeue_count = 0;
                entry.visible_at = Utc::now();
                self.space_available.notify_waiters();
                return true;
            }
            false
        } else {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            let removed = entries.len() != before;
            if removed {
                self.space_available.notify_waiters();
            }
            removed
        }
    }

    /// Count of currently-visible entries.
    pub fn depth(&self) -> usize {
        let now = Utc::now();
        self.entries.lock().iter().filter(|e| e.is_visible(now, self.options.max_dequeue_count)).count()
    }
}
