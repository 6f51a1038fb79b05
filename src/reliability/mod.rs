//! Reliability envelopes: the outbox (C5) and inbox (C6) stores that give
//! the pipeline at-least-once delivery with retry and deduplication.

pub mod inbox;
pub mod outbox;

pub use inbox::{AddOptions as InboxAddOptions, InboxEntry, InboxQuery, InboxStatus, InboxStore};
pub use outbox::{OutboxEntry, OutboxId, OutboxQuery, OutboxStatus, OutboxStore};
