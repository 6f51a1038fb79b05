//! Consumer (C8): pulls envelopes bound for one source, invokes the
//! user-supplied handler, and (optionally) acknowledges automatically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::instrumentation::{Instrumentation, NoopInstrumentation, OperationStatus};
use crate::queue::storage::QueueStorage;
use crate::transport::envelope::{AddressKind, TransportAddress, TransportEnvelope};
use crate::transport::Transport;

/// Context handed to a handler for each delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub source: String,
    pub attempt: u32,
    cancel: CancellationToken,
}

impl DeliveryContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// User-supplied message handler invoked by a [`Consumer`] worker.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, envelope: TransportEnvelope, ctx: DeliveryContext) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(TransportEnvelope, DeliveryContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    async fn handle(&self, envelope: TransportEnvelope, ctx: DeliveryContext) -> Result<()> {
        self(envelope, ctx).await
    }
}

/// Subscription options.
#[derive(Clone)]
pub struct ConsumerOptions {
    pub consumer_id: Option<String>,
    pub auto_acknowledge: bool,
    pub start_immediately: bool,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self { consumer_id: None, auto_acknowledge: true, start_immediately: true }
    }
}

/// A worker bound to one `TransportAddress`. Queue-bound consumers poll
/// [`QueueStorage`] directly; topic-bound consumers drain an internal
/// mpsc channel fed by [`crate::transport::Transport::publish`].
pub struct Consumer {
    pub id: String,
    pub source: TransportAddress,
    auto_acknowledge: bool,
    max_dequeue_count: u32,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
    queues: Arc<QueueStorage>,
    topic_sender: Option<mpsc::Sender<TransportEnvelope>>,
    topic_receiver: parking_lot::Mutex<Option<mpsc::Receiver<TransportEnvelope>>>,
    worker: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    instrumentation: Arc<dyn Instrumentation>,
    owner: Option<Weak<Transport>>,
}

impl Consumer {
    pub(crate) fn new_queue_bound(
        id: String,
        source: TransportAddress,
        queues: Arc<QueueStorage>,
        auto_acknowledge: bool,
        max_dequeue_count: u32,
    ) -> Self {
        debug_assert_eq!(source.kind, AddressKind::Queue);
        Self {
            id,
            source,
            auto_acknowledge,
            max_dequeue_count,
            active: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            queues,
            topic_sender: None,
            topic_receiver: parking_lot::Mutex::new(None),
            worker: parking_lot::Mutex::new(None),
            instrumentation: Arc::new(NoopInstrumentation),
            owner: None,
        }
    }

    pub(crate) fn new_topic_bound(
        id: String,
        source: TransportAddress,
        queues: Arc<QueueStorage>,
        auto_acknowledge: bool,
    ) -> Self {
        debug_assert_eq!(source.kind, AddressKind::Topic);
        let (tx, rx) = mpsc::channel(crate::constants::DEFAULT_MAX_QUEUE_LENGTH);
        Self {
            id,
            source,
            auto_acknowledge,
            max_dequeue_count: u32::MAX,
            active: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            queues,
            topic_sender: Some(tx),
            topic_receiver: parking_lot::Mutex::new(Some(rx)),
            worker: parking_lot::Mutex::new(None),
            instrumentation: Arc::new(NoopInstrumentation),
            owner: None,
        }
    }

    /// Swap in a real instrumentation backend; used by `Transport::subscribe`.
    pub(crate) fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    /// Record a back-reference to the owning transport; used by
    /// `Transport::subscribe` so disposal can deregister this consumer.
    pub(crate) fn with_owner(mut self, owner: Weak<Transport>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sender used by `Transport::publish` to fan out to this consumer.
    /// `None` for queue-bound consumers.
    pub(crate) fn topic_sender(&self) -> Option<mpsc::Sender<TransportEnvelope>> {
        self.topic_sender.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Begin dispatching envelopes to `handler` on a background task.
    pub fn start(self: &Arc<Self>, handler: Arc<dyn Handler>) {
        if self.active.swap(true, Ordering::AcqRel) {
            return;
        }

        let this = Arc::clone(self);
        let handle = match self.source.kind {
            AddressKind::Queue => tokio::spawn(async move { this.run_queue_loop(handler).await }),
            AddressKind::Topic => tokio::spawn(async move { this.run_topic_loop(handler).await }),
        };
        *self.worker.lock() = Some(handle);
    }

    /// Stop dispatching and deregister from the owning transport. Does
    /// not drop queued/buffered entries. Safe to call more than once.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.cancel.cancel();
            if let Some(handle) = self.worker.lock().take() {
                handle.abort();
            }
        }
        if let Some(transport) = self.owner.as_ref().and_then(Weak::upgrade) {
            transport.remove_consumer(&self.id, &self.source);
        }
    }

    async fn run_queue_loop(self: Arc<Self>, handler: Arc<dyn Handler>) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let Some(entry) = self.queues.dequeue(&self.source.name) else {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_millis(10)) => continue,
                }
            };
            self.deliver(&handler, entry.message, entry.dequeue_count, Some(entry.id)).await;
        }
    }

    async fn run_topic_loop(self: Arc<Self>, handler: Arc<dyn Handler>) {
        let mut receiver = self.topic_receiver.lock().take().expect("topic consumer owns its receiver");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                envelope = receiver.recv() => {
                    match envelope {
                        Some(envelope) => self.deliver(&handler, envelope, 0, None).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn deliver(
        &self,
        handler: &Arc<dyn Handler>,
        envelope: TransportEnvelope,
        attempt: u32,
        entry_id: Option<crate::queue::entry::EntryId>,
    ) {
        let parent_context = self.instrumentation.extract_trace_context(&envelope);
        let span = self.instrumentation.start_receive_activity(
            &envelope,
            &self.source.name,
            "memory",
            Some(self.id.as_str()),
            Some(&parent_context),
        );
        let started = Instant::now();

        let ctx = DeliveryContext { source: self.source.name.clone(), attempt, cancel: self.cancel.clone() };
        let outcome = handler.handle(envelope, ctx).await;

        let status = if outcome.is_ok() { OperationStatus::Success } else { OperationStatus::Failure };
        self.instrumentation.record_receive_duration(&self.source.name, started.elapsed(), status);
        if let Err(error) = &outcome {
            self.instrumentation.record_error(&span, error);
        }

        if !self.auto_acknowledge {
            return;
        }
        let Some(entry_id) = entry_id else { return };
        match outcome {
            Ok(()) => {
                self.queues.ack(&self.source.name, entry_id);
            }
            Err(_) => {
                let requeue = attempt + 1 < self.max_dequeue_count;
                self.queues.reject(&self.source.name, entry_id, requeue);
            }
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::entry::EnqueueOptions;

    struct CountingHandler {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Handler for CountingHandler {
        async fn handle(&self, _envelope: TransportEnvelope, _ctx: DeliveryContext) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn queue_bound_consumer_acknowledges_on_success() {
        let queues = Arc::new(QueueStorage::new());
        let cancel = CancellationToken::new();
        queues
            .enqueue("orders", TransportEnvelope::new("order.placed", vec![]), EnqueueOptions::default(), &cancel)
            .await
            .unwrap();

        let consumer = Arc::new(Consumer::new_queue_bound(
            "c1".into(),
            TransportAddress::queue("orders"),
            queues.clone(),
            true,
            5,
        ));
        let handler = Arc::new(CountingHandler { calls: Default::default() });
        consumer.start(handler.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        consumer.stop();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queues.queue_depth("orders"), 0);
    }
}
