//! Hero Messaging - in-process messaging runtime
//!
//! A ring-buffer queue substrate, reliability envelopes (outbox/inbox),
//! and a composable decorator pipeline for message handling, with
//! correlation context and W3C trace-context propagation threaded
//! through all three.

pub mod constants;
pub mod correlation;
pub mod disruptor;
pub mod error;
pub mod instrumentation;
pub mod message;
pub mod pipeline;
pub mod queue;
pub mod reliability;
pub mod trace_context;
pub mod transport;

// Re-export main components
pub use error::{HeroMessagingError, Result};
pub use message::{CausationId, CorrelationId, Message, MessageId, MessageKind, Metadata, MetadataValue};

pub use correlation::{begin_scope, begin_scope_for, correlation_chain, current, CorrelationState, ScopeGuard, WithCorrelation};
pub use trace_context::{SpanId, TraceContext, TraceId};

pub use disruptor::{ProducerType, RingBuffer, RingBufferConfig, SequenceBarrier, Sequencer, WaitStrategy, WaitStrategyType};

pub use queue::{ChannelQueue, EnqueueOptions, EntryId, QueueEntry, QueueOptions, QueueStorage};
pub use reliability::{InboxEntry, InboxStatus, InboxStore, OutboxEntry, OutboxId, OutboxStatus, OutboxStore};
pub use transport::{Consumer, ConsumerOptions, HealthReport, HealthStatus, Transport, TransportConfig, TransportState};
pub use transport::{AddressKind, TransportAddress, TransportEnvelope};

pub use pipeline::{Handler, PipelineBuilder, ProcessingContext, ProcessingResult};
pub use instrumentation::{Instrumentation, NoopInstrumentation, OperationStatus, SpanHandle, TracingInstrumentation};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
