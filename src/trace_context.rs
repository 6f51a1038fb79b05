//! W3C `traceparent`/`tracestate` codec for envelope headers.
//!
//! Format: `00-<32-hex trace-id>-<16-hex span-id>-<2-hex flags>`. Only
//! version `00` is supported; any other version, or malformed trace id
//! / span id, yields a zero parent context rather than an error —
//! extraction never fails the caller.

use crate::transport::envelope::TransportEnvelope;

const VERSION: &str = "00";
const TRACE_ID_HEX_LEN: usize = 32;
const SPAN_ID_HEX_LEN: usize = 16;
const FLAGS_HEX_LEN: usize = 2;

const TRACEPARENT_HEADER: &str = "traceparent";
const TRACESTATE_HEADER: &str = "tracestate";

/// A 128-bit trace id, stored as its 32 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceId([u8; 16]);

/// A 64-bit span id, stored as its 16 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanId([u8; 8]);

/// Parsed W3C trace context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub flags: u8,
    pub trace_state: Option<String>,
}

impl TraceContext {
    /// Build a fresh root context from raw id bytes.
    pub fn new(trace_id: [u8; 16], span_id: [u8; 8], flags: u8) -> Self {
        Self { trace_id: TraceId(trace_id), span_id: SpanId(span_id), flags, trace_state: None }
    }

    /// The zero context produced whenever extraction fails validation.
    pub fn zero() -> Self {
        Self { trace_id: TraceId([0; 16]), span_id: SpanId([0; 8]), flags: 0, trace_state: None }
    }

    fn to_traceparent(&self) -> String {
        let trace_id_hex = hex_encode(&self.trace_id.0);
        let span_id_hex = hex_encode(&self.span_id.0);
        format!("{VERSION}-{trace_id_hex}-{span_id_hex}-{:02x}", self.flags)
    }
}

/// Write `context` onto `envelope` as `traceparent` (and `tracestate`
/// if non-empty) headers, returning the updated envelope.
pub fn inject(envelope: TransportEnvelope, context: &TraceContext) -> TransportEnvelope {
    let mut envelope = envelope.with_header(TRACEPARENT_HEADER, context.to_traceparent());
    if let Some(state) = &context.trace_state {
        if !state.is_empty() {
            envelope = envelope.with_header(TRACESTATE_HEADER, state.clone());
        }
    }
    envelope
}

/// Parse `traceparent`/`tracestate` headers off `envelope`. Returns the
/// zero context (never an error) if the header is absent or malformed.
pub fn extract(envelope: &TransportEnvelope) -> TraceContext {
    let Some(traceparent) = envelope.header(TRACEPARENT_HEADER) else {
        return TraceContext::zero();
    };

    let mut context = match parse_traceparent(traceparent) {
        Some(context) => context,
        None => return TraceContext::zero(),
    };

    if let Some(state) = envelope.header(TRACESTATE_HEADER) {
        context.trace_state = Some(state.to_string());
    }
    context
}

fn parse_traceparent(value: &str) -> Option<TraceContext> {
    let mut parts = value.split('-');
    let version = parts.next()?;
    let trace_id_hex = parts.next()?;
    let span_id_hex = parts.next()?;
    let flags_hex = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    if version != VERSION {
        return None;
    }
    if trace_id_hex.len() != TRACE_ID_HEX_LEN || span_id_hex.len() != SPAN_ID_HEX_LEN || flags_hex.len() != FLAGS_HEX_LEN {
        return None;
    }

    let trace_id = hex_decode_16(trace_id_hex)?;
    let span_id = hex_decode_8(span_id_hex)?;
    let flags = u8::from_str_radix(flags_hex, 16).ok()?;

    Some(TraceContext { trace_id: TraceId(trace_id), span_id: SpanId(span_id), flags, trace_state: None })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode_16(hex: &str) -> Option<[u8; 16]> {
    let mut out = [0u8; 16];
    hex_decode_into(hex, &mut out)?;
    Some(out)
}

fn hex_decode_8(hex: &str) -> Option<[u8; 8]> {
    let mut out = [0u8; 8];
    hex_decode_into(hex, &mut out)?;
    Some(out)
}

fn hex_decode_into(hex: &str, out: &mut [u8]) -> Option<()> {
    if hex.len() != out.len() * 2 {
        return None;
    }
    for (i, byte) in out.iter_mut().enumerate() {
        let chunk = &hex[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(chunk, 16).ok()?;
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::envelope::TransportEnvelope;

    fn sample_context() -> TraceContext {
        TraceContext::new(
            [0x4b, 0xf9, 0x2f, 0x35, 0x77, 0xb3, 0x4d, 0xa6, 0xa3, 0xce, 0x92, 0x9d, 0x0e, 0x0e, 0x47, 0x36],
            [0x00, 0xf0, 0x67, 0xaa, 0x0b, 0xa9, 0x02, 0xb7],
            0x01,
        )
    }

    #[test]
    fn round_trip_preserves_ids_and_flags() {
        let envelope = TransportEnvelope::new("order.placed", vec![]);
        let injected = inject(envelope, &sample_context());
        let extracted = extract(&injected);

        assert_eq!(extracted.trace_id, sample_context().trace_id);
        assert_eq!(extracted.span_id, sample_context().span_id);
        assert_eq!(extracted.flags, sample_context().flags);
    }

    #[test]
    fn unknown_tracestate_passes_through_verbatim() {
        let mut context = sample_context();
        context.trace_state = Some("vendor1=value1,vendor2=value2".into());

        let envelope = TransportEnvelope::new("order.placed", vec![]);
        let injected = inject(envelope, &context);
        let extracted = extract(&injected);

        assert_eq!(extracted.trace_state.as_deref(), Some("vendor1=value1,vendor2=value2"));
    }

    #[test]
    fn bad_version_yields_zero_context() {
        let envelope = TransportEnvelope::new("x", vec![])
            .with_header("traceparent", "01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01");
        assert_eq!(extract(&envelope), TraceContext::zero());
    }

    #[test]
    fn malformed_hex_yields_zero_context() {
        let envelope = TransportEnvelope::new("x", vec![])
            .with_header("traceparent", "00-not-hex-at-all-00f067aa0ba902b7-01");
        assert_eq!(extract(&envelope), TraceContext::zero());
    }

    #[test]
    fn missing_header_yields_zero_context() {
        let envelope = TransportEnvelope::new("x", vec![]);
        assert_eq!(extract(&envelope), TraceContext::zero());
    }
}
