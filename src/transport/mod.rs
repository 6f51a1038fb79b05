//! Transport (C7): named queues and topics multiplexed to consumers,
//! behind a connect/disconnect state machine.

pub mod consumer;
pub mod envelope;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{HeroMessagingError, Result};
use crate::instrumentation::{Instrumentation, NoopInstrumentation, OperationStatus};
use crate::queue::entry::{EnqueueOptions, QueueOptions};
use crate::queue::storage::QueueStorage;

pub use consumer::{Consumer, ConsumerOptions, DeliveryContext, Handler};
pub use envelope::{AddressKind, TransportAddress, TransportEnvelope};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Faulted,
}

/// Health classification derived from `TransportState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl From<TransportState> for HealthStatus {
    fn from(state: TransportState) -> Self {
        match state {
            TransportState::Connected => HealthStatus::Healthy,
            TransportState::Connecting | TransportState::Disconnecting => HealthStatus::Degraded,
            TransportState::Disconnected | TransportState::Faulted => HealthStatus::Unhealthy,
        }
    }
}

/// Emitted on every state transition.
#[derive(Debug, Clone)]
pub struct StateObservation {
    pub previous: TransportState,
    pub current: TransportState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub state: TransportState,
    pub transport_name: String,
    pub status_message: String,
    pub timestamp: DateTime<Utc>,
    pub active_consumers: usize,
    pub pending_messages: usize,
    pub queue_count: usize,
    pub topic_count: usize,
    pub consumer_count: usize,
}

/// Idempotent topology declaration consumed by [`Transport::configure_topology`].
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub queues: Vec<String>,
    pub topics: Vec<String>,
}

/// Transport-wide configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub name: String,
    pub max_queue_length: usize,
    pub drop_when_full: bool,
    pub simulate_network_delay: bool,
    pub simulated_delay_min: Duration,
    pub simulated_delay_max: Duration,
}

impl TransportConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_queue_length: crate::constants::DEFAULT_MAX_QUEUE_LENGTH,
            drop_when_full: false,
            simulate_network_delay: false,
            simulated_delay_min: Duration::from_millis(0),
            simulated_delay_max: Duration::from_millis(0),
        }
    }
}

/// An in-memory transport multiplexing named queues (point-to-point) and
/// topics (fan-out) to subscribed consumers.
pub struct Transport {
    config: TransportConfig,
    state: RwLock<TransportState>,
    queues: Arc<QueueStorage>,
    topics: DashMap<String, Vec<Arc<Consumer>>>,
    consumers: DashMap<String, Arc<Consumer>>,
    consumer_sequence: AtomicU64,
    instrumentation: Arc<dyn Instrumentation>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            state: RwLock::new(TransportState::Disconnected),
            queues: Arc::new(QueueStorage::new()),
            topics: DashMap::new(),
            consumers: DashMap::new(),
            consumer_sequence: AtomicU64::new(0),
            instrumentation: Arc::new(NoopInstrumentation),
        }
    }

    /// Swap in a real instrumentation backend (default `NoopInstrumentation`).
    pub fn with_instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> TransportState {
        *self.state.read()
    }

    fn transition(&self, to: TransportState, reason: &str) -> StateObservation {
        let mut state = self.state.write();
        let previous = *state;
        *state = to;
        StateObservation { previous, current: to, reason: reason.to_string(), timestamp: Utc::now() }
    }

    fn require_connected(&self) -> Result<()> {
        if self.state() == TransportState::Connected {
            Ok(())
        } else {
            Err(HeroMessagingError::invalid_state("transport is not connected"))
        }
    }

    /// `Disconnected -> Connecting -> Connected`, optionally simulating a
    /// bounded random delay.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        self.transition(TransportState::Connecting, "connect requested");

        if self.config.simulate_network_delay {
            let delay = random_delay(self.config.simulated_delay_min, self.config.simulated_delay_max);
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.transition(TransportState::Faulted, "connect cancelled");
                    return Err(HeroMessagingError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.transition(TransportState::Connected, "connected");
        Ok(())
    }

    /// Moves every consumer to stopped and drops queues, topics, and
    /// subscriber registries.
    pub async fn disconnect(&self) -> Result<()> {
        self.transition(TransportState::Disconnecting, "disconnect requested");
        let consumers: Vec<Arc<Consumer>> = self.consumers.iter().map(|entry| entry.value().clone()).collect();
        self.consumers.clear();
        self.topics.clear();
        for consumer in consumers {
            consumer.stop();
        }
        self.transition(TransportState::Disconnected, "disconnected");
        Ok(())
    }

    /// Enqueue `envelope` on the named queue; blocks on backpressure (or
    /// drops the oldest entry) per transport config.
    pub async fn send(&self, destination: &str, envelope: TransportEnvelope, cancel: &CancellationToken) -> Result<()> {
        self.require_connected()?;
        let _span = self.instrumentation.start_send_activity(destination, &self.config.name);
        let started = std::time::Instant::now();

        let result = self.queues.enqueue(destination, envelope, EnqueueOptions::default(), cancel).await;

        let status = if result.is_ok() { OperationStatus::Success } else { OperationStatus::Failure };
        self.instrumentation.record_send_duration(destination, started.elapsed(), status);
        result?;
        Ok(())
    }

    /// Fan out a copy of `envelope` to every current subscriber of the
    /// topic. Late subscribers do not receive prior publications.
    pub fn publish(&self, destination: &str, envelope: TransportEnvelope) -> Result<()> {
        self.require_connected()?;
        let _span = self.instrumentation.start_publish_activity(destination, &self.config.name);
        let started = std::time::Instant::now();

        if let Some(subscribers) = self.topics.get(destination) {
            for consumer in subscribers.iter() {
                if let Some(sender) = consumer.topic_sender() {
                    let _ = sender.try_send(envelope.clone());
                }
            }
        }

        self.instrumentation.record_send_duration(destination, started.elapsed(), OperationStatus::Success);
        Ok(())
    }

    /// Register a consumer against `source`. Duplicate `consumer_id`
    /// fails with `InvalidState`. `self` must be held behind an `Arc` so
    /// the consumer can keep a back-reference to its owning transport
    /// (used to deregister itself on disposal).
    pub fn subscribe(
        self: &Arc<Self>,
        source: TransportAddress,
        handler: Arc<dyn Handler>,
        opts: ConsumerOptions,
    ) -> Result<Arc<Consumer>> {
        self.require_connected()?;

        let id = opts.consumer_id.clone().unwrap_or_else(|| {
            format!("consumer-{}", self.consumer_sequence.fetch_add(1, Ordering::Relaxed))
        });
        if self.consumers.contains_key(&id) {
            return Err(HeroMessagingError::invalid_state(format!("duplicate consumer id '{id}'")));
        }

        let owner = Arc::downgrade(self);
        let consumer = match source.kind {
            AddressKind::Queue => {
                self.queues.create_queue(&source.name, QueueOptions::default());
                Arc::new(
                    Consumer::new_queue_bound(
                        id.clone(),
                        source.clone(),
                        self.queues.clone(),
                        opts.auto_acknowledge,
                        crate::constants::DEFAULT_MAX_DEQUEUE_COUNT,
                    )
                    .with_instrumentation(self.instrumentation.clone())
                    .with_owner(owner),
                )
            }
            AddressKind::Topic => {
                let consumer = Arc::new(
                    Consumer::new_topic_bound(id.clone(), source.clone(), self.queues.clone(), opts.auto_acknowledge)
                        .with_instrumentation(self.instrumentation.clone())
                        .with_owner(owner),
                );
                self.topics.entry(source.name.clone()).or_default().push(consumer.clone());
                consumer
            }
        };

        self.consumers.insert(id, consumer.clone());
        if opts.start_immediately {
            consumer.start(handler);
        }
        Ok(consumer)
    }

    /// Idempotently declare queues and topics. Legal only in `Connected`.
    pub fn configure_topology(&self, topology: &Topology) -> Result<()> {
        self.require_connected()?;
        for queue in &topology.queues {
            self.queues.create_queue(queue, QueueOptions::default());
        }
        for topic in &topology.topics {
            self.topics.entry(topic.clone()).or_default();
        }
        Ok(())
    }

    /// Drop `id` from the consumer registry and, if it was topic-bound,
    /// from that topic's subscriber list. Called by a disposed
    /// [`Consumer`] via its back-reference; a no-op if already removed
    /// (e.g. by a prior `disconnect`).
    pub(crate) fn remove_consumer(&self, id: &str, source: &TransportAddress) {
        self.consumers.remove(id);
        if source.kind == AddressKind::Topic {
            if let Some(mut subscribers) = self.topics.get_mut(&source.name) {
                subscribers.retain(|c| c.id != id);
            }
        }
    }

    pub fn health(&self) -> HealthReport {
        let state = self.state();
        let pending_messages: usize = self.consumers.iter().map(|c| self.queues.queue_depth(&c.value().source.name)).sum();
        HealthReport {
            status: HealthStatus::from(state),
            state,
            transport_name: self.config.name.clone(),
            status_message: format!("{state:?}"),
            timestamp: Utc::now(),
            active_consumers: self.consumers.iter().filter(|c| c.value().is_active()).count(),
            pending_messages,
            queue_count: self.queues.queue_count(),
            topic_count: self.topics.len(),
            consumer_count: self.consumers.len(),
        }
    }

    pub fn queues(&self) -> &QueueStorage {
        &self.queues
    }
}

fn random_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let mut rng = rand::rng();
    let span = (max - min).as_millis() as u64;
    min + Duration::from_millis(rng.random_range(0..=span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopHandler;

    #[async_trait]
    impl Handler for NoopHandler {
        async fn handle(&self, _envelope: TransportEnvelope, _ctx: DeliveryContext) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn operations_fail_when_not_connected() {
        let transport = Transport::new(TransportConfig::new("bus"));
        let cancel = CancellationToken::new();
        let result = transport.send("orders", TransportEnvelope::new("x", vec![]), &cancel).await;
        assert!(matches!(result, Err(HeroMessagingError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn connect_then_send_succeeds() {
        let transport = Transport::new(TransportConfig::new("bus"));
        let cancel = CancellationToken::new();
        transport.connect(&cancel).await.unwrap();
        assert_eq!(transport.state(), TransportState::Connected);
        transport.send("orders", TransportEnvelope::new("x", vec![]), &cancel).await.unwrap();
        assert_eq!(transport.queues().queue_depth("orders"), 1);
    }

    #[tokio::test]
    async fn duplicate_consumer_id_is_rejected() {
        let transport = Arc::new(Transport::new(TransportConfig::new("bus")));
        let cancel = CancellationToken::new();
        transport.connect(&cancel).await.unwrap();
        let opts = ConsumerOptions { consumer_id: Some("c1".into()), auto_acknowledge: true, start_immediately: false };
        transport.subscribe(TransportAddress::queue("orders"), Arc::new(NoopHandler), opts.clone()).unwrap();
        let result = transport.subscribe(TransportAddress::queue("orders"), Arc::new(NoopHandler), opts);
        assert!(matches!(result, Err(HeroMessagingError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn publish_fans_out_to_current_subscribers_only() {
        let transport = Arc::new(Transport::new(TransportConfig::new("bus")));
        let cancel = CancellationToken::new();
        transport.connect(&cancel).await.unwrap();

        let opts = ConsumerOptions { consumer_id: None, auto_acknowledge: true, start_immediately: true };
        let consumer = transport.subscribe(TransportAddress::topic("events"), Arc::new(NoopHandler), opts).unwrap();
        transport.publish("events", TransportEnvelope::new("order.placed", vec![])).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(consumer.is_active());
    }

    #[tokio::test]
    async fn disposing_a_consumer_removes_it_from_its_transport() {
        let transport = Arc::new(Transport::new(TransportConfig::new("bus")));
        let cancel = CancellationToken::new();
        transport.connect(&cancel).await.unwrap();

        let opts = ConsumerOptions { consumer_id: Some("c1".into()), auto_acknowledge: true, start_immediately: false };
        let consumer = transport.subscribe(TransportAddress::queue("orders"), Arc::new(NoopHandler), opts).unwrap();
        assert_eq!(transport.health().consumer_count, 1);

        // `transport.consumers` holds its own `Arc<Consumer>`, so stopping
        // (not merely dropping this local handle) is what disposes it.
        consumer.stop();
        assert_eq!(transport.health().consumer_count, 0);
    }

    #[tokio::test]
    async fn disconnect_deregisters_topic_subscribers() {
        let transport = Arc::new(Transport::new(TransportConfig::new("bus")));
        let cancel = CancellationToken::new();
        transport.connect(&cancel).await.unwrap();

        let opts = ConsumerOptions { consumer_id: Some("c1".into()), auto_acknowledge: true, start_immediately: false };
        let _consumer = transport.subscribe(TransportAddress::topic("events"), Arc::new(NoopHandler), opts).unwrap();
        assert_eq!(transport.health().consumer_count, 1);

        transport.disconnect().await.unwrap();
        assert_eq!(transport.health().consumer_count, 0);
    }

    #[tokio::test]
    async fn configure_topology_requires_connected_state() {
        let transport = Transport::new(TransportConfig::new("bus"));
        let topology = Topology { queues: vec!["orders".into()], topics: vec![] };
        assert!(matches!(transport.configure_topology(&topology), Err(HeroMessagingError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn health_degrades_then_goes_unhealthy_on_disconnect() {
        let transport = Transport::new(TransportConfig::new("bus"));
        assert_eq!(transport.health().status, HealthStatus::Unhealthy);
        let cancel = CancellationToken::new();
        transport.connect(&cancel).await.unwrap();
        assert_eq!(transport.health().status, HealthStatus::Healthy);
        transport.disconnect().await.unwrap();
        assert_eq!(transport.health().status, HealthStatus::Unhealthy);
    }
}
