//! Wire-level envelope and addressing types carried by [`crate::transport`].
//!
//! `TransportEnvelope` is distinct from [`crate::message::Message`]: the
//! message is the application's typed payload, the envelope is what
//! actually rides the queue/topic, carrying string headers (trace
//! context, correlation ids) alongside the serialized body.

use std::collections::HashMap;

/// An immutable, copy-on-write envelope handed to queues, topics, and
/// consumers. `with_header` returns a new value rather than mutating
/// in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    pub message_type: String,
    pub body: Vec<u8>,
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub conversation_id: Option<String>,
    headers: HashMap<String, String>,
}

impl TransportEnvelope {
    /// Build a new envelope with a fresh random `message_id` and no headers.
    pub fn new(message_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            message_type: message_type.into(),
            body,
            message_id: uuid::Uuid::new_v4().to_string(),
            correlation_id: None,
            causation_id: None,
            conversation_id: None,
            headers: HashMap::new(),
        }
    }

    /// Build an envelope from a core [`crate::message::Message`], carrying
    /// its id and correlation/causation strings across.
    pub fn from_message(message: &crate::message::Message) -> Self {
        Self {
            message_type: message.message_type.clone(),
            body: message.body.clone(),
            message_id: message.id.to_string(),
            correlation_id: message.correlation_id.clone(),
            causation_id: message.causation_id.clone(),
            conversation_id: None,
            headers: HashMap::new(),
        }
    }

    /// Set `correlation_id`, returning a new envelope.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Attach a header, returning a new envelope.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Look up a header by key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// All headers, in no particular order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The two address kinds a [`crate::transport::Transport`] multiplexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// Point-to-point: one message, one consumer.
    Queue,
    /// Fan-out: every current subscriber receives a copy.
    Topic,
}

/// A named, typed transport destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportAddress {
    pub name: String,
    pub kind: AddressKind,
}

impl TransportAddress {
    pub fn queue(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: AddressKind::Queue }
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: AddressKind::Topic }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_header_is_copy_on_write() {
        let original = TransportEnvelope::new("order.placed", vec![1, 2, 3]);
        let tagged = original.clone().with_header("traceparent", "00-...");
        assert!(original.header("traceparent").is_none());
        assert_eq!(tagged.header("traceparent"), Some("00-..."));
    }

    #[test]
    fn from_message_carries_ids_across() {
        let message = crate::message::Message::command("order.place", vec![9]).with_correlation_ids(
            Some("corr-1".into()),
            Some("cause-1".into()),
        );
        let envelope = TransportEnvelope::from_message(&message);
        assert_eq!(envelope.message_id, message.id.to_string());
        assert_eq!(envelope.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(envelope.causation_id.as_deref(), Some("cause-1"));
    }

    #[test]
    fn address_kinds_distinguish_queue_from_topic() {
        assert_eq!(TransportAddress::queue("orders").kind, AddressKind::Queue);
        assert_eq!(TransportAddress::topic("orders").kind, AddressKind::Topic);
    }
}
