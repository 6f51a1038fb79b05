//! Named-queue registry (C4): auto-creating enqueue, visibility-aware
//! dequeue, peek, ack/reject, and queue lifecycle.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::queue::channel_queue::ChannelQueue;
use crate::queue::entry::{EnqueueOptions, EntryId, QueueEntry, QueueOptions};
use crate::transport::envelope::TransportEnvelope;

/// Registry of named [`ChannelQueue`]s. Unknown-queue reads return empty
/// results; unknown-queue ack/reject return `false` — neither is an error.
///
/// Queues are reference-counted so a lookup never holds the map's shard
/// lock across an `.await` — a blocked `enqueue` on one queue must not
/// stall `ack`/`reject` calls that would free its space.
#[derive(Default)]
pub struct QueueStorage {
    queues: DashMap<String, Arc<ChannelQueue<TransportEnvelope>>>,
}

impl QueueStorage {
    pub fn new() -> Self {
        Self { queues: DashMap::new() }
    }

    /// Returns `true` if created; `false` on duplicate. Idempotent for
    /// deleted/missing names.
    pub fn create_queue(&self, name: &str, options: QueueOptions) -> bool {
        if self.queues.contains_key(name) {
            return false;
        }
        self.queues.insert(name.to_string(), Arc::new(ChannelQueue::new(options)));
        true
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    pub fn delete_queue(&self, name: &str) -> bool {
        self.queues.remove(name).is_some()
    }

    /// Auto-creates the queue (with default options) if absent.
    pub async fn enqueue(
        &self,
        name: &str,
        message: TransportEnvelope,
        options: EnqueueOptions,
        cancel: &CancellationToken,
    ) -> crate::error::Result<QueueEntry<TransportEnvelope>> {
        let queue = self
            .queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ChannelQueue::new(QueueOptions::default())))
            .clone();
        queue.enqueue(message, options, cancel).await
    }

    pub fn dequeue(&self, name: &str) -> Option<QueueEntry<TransportEnvelope>> {
        self.queues.get(name).and_then(|q| q.dequeue())
    }

    pub fn peek(&self, name: &str, count: usize) -> Vec<QueueEntry<TransportEnvelope>> {
        self.queues.get(name).map(|q| q.peek(count)).unwrap_or_default()
    }

    pub fn ack(&self, name: &str, id: EntryId) -> bool {
        self.queues.get(name).map(|q| q.ack(id)).unwrap_or(false)
    }

    pub fn reject(&self, name: &str, id: EntryId, requeue: bool) -> bool {
        self.queues.get(name).map(|q| q.reject(id, requeue)).unwrap_or(false)
    }

    pub fn queue_depth(&self, name: &str) -> usize {
        self.queues.get(name).map(|q| q.depth()).unwrap_or(0)
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn create_queue_rejects_duplicates() {
        let storage = QueueStorage::new();
        assert!(storage.create_queue("orders", QueueOptions::default()));
        assert!(!storage.create_queue("orders", QueueOptions::default()));
    }

    #[tokio::test]
    async fn unknown_queue_reads_are_empty_not_errors() {
        let storage = QueueStorage::new();
        assert!(storage.dequeue("ghost").is_none());
        assert!(storage.peek("ghost", 10).is_empty());
        assert_eq!(storage.queue_depth("ghost"), 0);
    }

    #[tokio::test]
    async fn unknown_queue_ack_reject_return_false() {
        let storage = QueueStorage::new();
        assert!(!storage.ack("ghost", EntryId::new()));
        assert!(!storage.reject("ghost", EntryId::new(), true));
    }

    #[tokio::test]
    async fn enqueue_auto_creates_queue() {
        let storage = QueueStorage::new();
        assert!(!storage.queue_exists("orders"));
        let cancel = token();
        storage
            .enqueue("orders", TransportEnvelope::new("order.placed", vec![]), EnqueueOptions::default(), &cancel)
            .await
            .unwrap();
        assert!(storage.queue_exists("orders"));
        assert_eq!(storage.queue_depth("orders"), 1);
    }

    #[tokio::test]
    async fn delete_queue_drops_unacked_entries() {
        let storage = QueueStorage::new();
        let cancel = token();
        storage
            .enqueue("orders", TransportEnvelope::new("order.placed", vec![]), EnqueueOptions::default(), &cancel)
            .await
            .unwrap();
        assert!(storage.delete_queue("orders"));
        assert!(!storage.queue_exists("orders"));
        assert_eq!(storage.queue_depth("orders"), 0);
    }
}
