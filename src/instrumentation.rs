//! Instrumentation contract consumed by the transport, consumer, and
//! pipeline modules. The core depends only on this trait — never on a
//! concrete telemetry backend — so a caller can plug in whatever
//! exporter it likes, or nothing at all (`NoopInstrumentation`).

use std::collections::HashMap;
use std::time::Duration;

use crate::trace_context::TraceContext;
use crate::transport::envelope::TransportEnvelope;

/// An opaque span handle. `None` means "no active span" — every method
/// on `Instrumentation` accepts it as a valid, inert value so callers
/// never have to special-case a no-op implementation.
#[derive(Clone)]
pub struct SpanHandle(pub(crate) Option<tracing::Span>);

impl SpanHandle {
    /// The inert handle carrying no span.
    pub fn none() -> Self {
        Self(None)
    }
}

/// Outcome recorded for a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Failure,
}

/// Instrumentation surface consumed by `transport`, `pipeline`, and
/// `queue::consumer`. Implementations must be cheap enough to call on
/// every message; the default `TracingInstrumentation` delegates to
/// `tracing::Span`, and `NoopInstrumentation` discards everything.
pub trait Instrumentation: Send + Sync {
    /// Start a span around a producer `Send` to `destination`.
    fn start_send_activity(&self, destination: &str, transport: &str) -> SpanHandle;

    /// Start a span around a producer `Publish` to `destination`.
    fn start_publish_activity(&self, destination: &str, transport: &str) -> SpanHandle;

    /// Start a span around a consumer receiving `envelope` from `endpoint`.
    fn start_receive_activity(
        &self,
        envelope: &TransportEnvelope,
        endpoint: &str,
        transport: &str,
        consumer_id: Option<&str>,
        parent_context: Option<&TraceContext>,
    ) -> SpanHandle;

    /// Record the duration of a completed send.
    fn record_send_duration(&self, destination: &str, duration: Duration, status: OperationStatus);

    /// Record the duration of a completed receive/handle cycle.
    fn record_receive_duration(&self, endpoint: &str, duration: Duration, status: OperationStatus);

    /// Record the duration spent (de)serializing a message body.
    fn record_serialization_duration(&self, message_type: &str, duration: Duration);

    /// Record a named operation outcome (e.g. pipeline decorator name).
    fn record_operation(&self, name: &str, operation: &str, status: OperationStatus);

    /// Record an error against `span`.
    fn record_error(&self, span: &SpanHandle, error: &dyn std::error::Error);

    /// Add a point-in-time event to `span`.
    fn add_event(&self, span: &SpanHandle, name: &str, attributes: Option<HashMap<String, String>>);

    /// Inject `span`'s trace context onto `envelope`, returning the
    /// updated envelope.
    fn inject_trace_context(&self, envelope: TransportEnvelope, span: &SpanHandle) -> TransportEnvelope;

    /// Extract a parent trace context from `envelope`.
    fn extract_trace_context(&self, envelope: &TransportEnvelope) -> TraceContext;
}

/// Implementation backed by the `tracing` crate. Spans are real
/// `tracing::Span`s; a subscriber (e.g. `tracing-subscriber` or an
/// OpenTelemetry bridge) decides what happens to them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInstrumentation;

impl Instrumentation for TracingInstrumentation {
    fn start_send_activity(&self, destination: &str, transport: &str) -> SpanHandle {
        let span = tracing::span!(tracing::Level::DEBUG, "send", destination, transport);
        SpanHandle(Some(span))
    }

    fn start_publish_activity(&self, destination: &str, transport: &str) -> SpanHandle {
        let span = tracing::span!(tracing::Level::DEBUG, "publish", destination, transport);
        SpanHandle(Some(span))
    }

    fn start_receive_activity(
        &self,
        envelope: &TransportEnvelope,
        endpoint: &str,
        transport: &str,
        consumer_id: Option<&str>,
        _parent_context: Option<&TraceContext>,
    ) -> SpanHandle {
        let span = tracing::span!(
            tracing::Level::DEBUG,
            "process_message",
            message_type = %envelope.message_type,
            endpoint,
            transport,
            consumer_id,
        );
        SpanHandle(Some(span))
    }

    fn record_send_duration(&self, destination: &str, duration: Duration, status: OperationStatus) {
        tracing::debug!(destination, ?duration, ?status, "send completed");
    }

    fn record_receive_duration(&self, endpoint: &str, duration: Duration, status: OperationStatus) {
        tracing::debug!(endpoint, ?duration, ?status, "receive completed");
    }

    fn record_serialization_duration(&self, message_type: &str, duration: Duration) {
        tracing::debug!(message_type, ?duration, "serialization completed");
    }

    fn record_operation(&self, name: &str, operation: &str, status: OperationStatus) {
        tracing::debug!(name, operation, ?status, "operation recorded");
    }

    fn record_error(&self, span: &SpanHandle, error: &dyn std::error::Error) {
        if let Some(span) = &span.0 {
            let _guard = span.enter();
            tracing::error!(error = %error, "operation failed");
        } else {
            tracing::error!(error = %error, "operation failed");
        }
    }

    fn add_event(&self, span: &SpanHandle, name: &str, attributes: Option<HashMap<String, String>>) {
        if let Some(span) = &span.0 {
            let _guard = span.enter();
        }
        tracing::debug!(name, ?attributes, "event");
    }

    fn inject_trace_context(&self, envelope: TransportEnvelope, _span: &SpanHandle) -> TransportEnvelope {
        // The tracing backend does not expose raw trace/span ids through
        // its public API, so propagation degrades to whatever context
        // is already on the envelope; the W3C codec in `trace_context`
        // is what implementations with real ids (e.g. an OTel bridge)
        // should call here instead.
        envelope
    }

    fn extract_trace_context(&self, envelope: &TransportEnvelope) -> TraceContext {
        crate::trace_context::extract(envelope)
    }
}

/// Implementation that discards everything. Used where telemetry is
/// unwanted or unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn start_send_activity(&self, _destination: &str, _transport: &str) -> SpanHandle {
        SpanHandle::none()
    }

    fn start_publish_activity(&self, _destination: &str, _transport: &str) -> SpanHandle {
        SpanHandle::none()
    }

    fn start_receive_activity(
        &self,
        _envelope: &TransportEnvelope,
        _endpoint: &str,
        _transport: &str,
        _consumer_id: Option<&str>,
        _parent_context: Option<&TraceContext>,
    ) -> SpanHandle {
        SpanHandle::none()
    }

    fn record_send_duration(&self, _destination: &str, _duration: Duration, _status: OperationStatus) {}
    fn record_receive_duration(&self, _endpoint: &str, _duration: Duration, _status: OperationStatus) {}
    fn record_serialization_duration(&self, _message_type: &str, _duration: Duration) {}
    fn record_operation(&self, _name: &str, _operation: &str, _status: OperationStatus) {}
    fn record_error(&self, _span: &SpanHandle, _error: &dyn std::error::Error) {}
    fn add_event(&self, _span: &SpanHandle, _name: &str, _attributes: Option<HashMap<String, String>>) {}

    fn inject_trace_context(&self, envelope: TransportEnvelope, _span: &SpanHandle) -> TransportEnvelope {
        envelope
    }

    fn extract_trace_context(&self, _envelope: &TransportEnvelope) -> TraceContext {
        TraceContext::zero()
    }
}
