//! Message identity and the command/query/event envelope carried through
//! the pipeline, independent of the wire-level `TransportEnvelope` (see
//! `transport::envelope`).

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 128-bit message identity. Two messages with the same id are treated
/// as duplicates by the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh, random message id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID (e.g. one carried on the wire).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-form correlation identifier shared by every message in one
/// logical workflow.
pub type CorrelationId = String;

/// Identifier of the message that directly caused the current one.
pub type CausationId = String;

/// A single metadata value attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// String-keyed metadata map carried alongside a message.
pub type Metadata = HashMap<String, MetadataValue>;

/// The three message kinds the core distinguishes for routing and
/// validation/authorization purposes. Queries carry a `response_type`
/// witness used only for documentation/introspection — the core does
/// not enforce a response type at this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    /// An instruction a single handler is expected to act on.
    Command,
    /// A request expecting exactly one response of `response_type`.
    Query { response_type: String },
    /// A fact that has already happened; may fan out to many handlers.
    Event,
}

/// A message flowing through the pipeline.
///
/// `Message` is immutable with respect to `id`/`timestamp`; `with_correlation`
/// and `with_metadata` return a new value (copy-on-write), matching the
/// immutability invariant in the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<CorrelationId>,
    pub causation_id: Option<CausationId>,
    pub metadata: Metadata,
    pub body: Vec<u8>,
}

impl Message {
    /// Construct a new message with a fresh id and the current timestamp.
    pub fn new(message_type: impl Into<String>, kind: MessageKind, body: Vec<u8>) -> Self {
        Self {
            id: MessageId::new(),
            kind,
            message_type: message_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            causation_id: None,
            metadata: Metadata::new(),
            body,
        }
    }

    /// Construct a command message.
    pub fn command(message_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(message_type, MessageKind::Command, body)
    }

    /// Construct an event message.
    pub fn event(message_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(message_type, MessageKind::Event, body)
    }

    /// Construct a query message with the given response type witness.
    pub fn query(message_type: impl Into<String>, response_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(message_type, MessageKind::Query { response_type: response_type.into() }, body)
    }

    /// Attach a metadata entry, returning a new message.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set correlation/causation explicitly, returning a new message.
    pub fn with_correlation_ids(mut self, correlation_id: Option<CorrelationId>, causation_id: Option<CausationId>) -> Self {
        self.correlation_id = correlation_id;
        self.causation_id = causation_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn with_metadata_is_copy_on_write() {
        let original = Message::command("order.place", vec![]);
        let tagged = original.clone().with_metadata("tenant", "acme");
        assert!(original.metadata.is_empty());
        assert_eq!(tagged.metadata.get("tenant"), Some(&MetadataValue::Text("acme".into())));
    }
}
