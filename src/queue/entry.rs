//! Queue entry type and enqueue options shared by [`super::channel_queue`]
//! and [`super::storage`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity of an entry resident in a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-enqueue options: lower `priority` dequeues first; `delay` pushes
/// `visible_at` into the future.
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    pub priority: i32,
    pub delay: Duration,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self { priority: 0, delay: Duration::ZERO }
    }
}

/// Queue-wide behavior applied by [`super::channel_queue::ChannelQueue`].
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    pub max_length: usize,
    pub drop_when_full: bool,
    pub visibility_timeout: Duration,
    pub max_dequeue_count: u32,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_length: crate::constants::DEFAULT_MAX_QUEUE_LENGTH,
            drop_when_full: false,
            visibility_timeout: crate::constants::DEFAULT_VISIBILITY_TIMEOUT,
            max_dequeue_count: crate::constants::DEFAULT_MAX_DEQUEUE_COUNT,
        }
    }
}

/// A resident queue entry wrapping a caller-supplied payload `T`.
#[derive(Debug, Clone)]
pub struct QueueEntry<T> {
    pub id: EntryId,
    pub message: T,
    pub enqueued_at: DateTime<Utc>,
    pub visible_at: DateTime<Utc>,
    pub dequeue_count: u32,
    pub priority: i32,
}

impl<T> QueueEntry<T> {
    pub fn new(message: T, options: EnqueueOptions) -> Self {
        let enqueued_at = Utc::now();
        let visible_at = enqueued_at
            + chrono::Duration::from_std(options.delay).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            id: EntryId::new(),
            message,
            enqueued_at,
            visible_at,
            dequeue_count: 0,
            priority: options.priority,
        }
    }

    pub fn is_visible(&self, now: DateTime<Utc>, max_dequeue_count: u32) -> bool {
        self.visible_at <= now && self.dequeue_count < max_dequeue_count
    }
}
