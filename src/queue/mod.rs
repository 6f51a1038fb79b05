//! Queue substrate: a bounded, priority- and delay-aware channel queue
//! (C3) behind a named-queue registry (C4).

pub mod channel_queue;
pub mod entry;
pub mod storage;

pub use channel_queue::ChannelQueue;
pub use entry::{EnqueueOptions, EntryId, QueueEntry, QueueOptions};
pub use storage::QueueStorage;
