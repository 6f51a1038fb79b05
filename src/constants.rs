//! HeroMessaging tunable defaults
//!
//! Central home for default sizes and timeouts used across the queue,
//! reliability, and pipeline modules when a caller doesn't override them.

use std::time::Duration;

/// Default ring buffer size (must be power of 2)
pub const DEFAULT_RING_BUFFER_SIZE: usize = 4096;

/// Cache line size for alignment (64 bytes on most CPUs). Sizes the
/// padding in `disruptor::sequencer::PaddedSequence`.
pub const CACHE_LINE_SIZE: usize = 64;

/// Default bounded channel-queue length
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 10_000;

/// Default visibility timeout applied to a dequeued entry before it
/// becomes visible again if not acknowledged.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum dequeue attempts before an entry is left stranded
/// (the caller's dead-letter policy decides what happens next).
pub const DEFAULT_MAX_DEQUEUE_COUNT: u32 = 5;

/// Default outbox retry ceiling before an entry moves to `Failed`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default inbox dedup window.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(300);

/// Default retry decorator base delay.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Default retry decorator exponential backoff factor.
pub const DEFAULT_RETRY_FACTOR: f64 = 2.0;

/// Default retry decorator backoff ceiling.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default retry decorator attempt ceiling.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_size_is_power_of_two() {
        assert!(DEFAULT_RING_BUFFER_SIZE.is_power_of_two());
    }

    #[test]
    fn test_cache_line_size_is_power_of_two() {
        assert!(CACHE_LINE_SIZE.is_power_of_two());
    }
}
