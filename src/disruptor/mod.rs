//! Ring buffer substrate based on the LMAX Disruptor pattern (C1, C2).
//!
//! A [`Sequencer`] claims and publishes slot indices; a [`RingBuffer`]
//! owns the pre-allocated slots and hands out [`SequenceBarrier`]s that
//! consumers use to wait for new data per a configurable [`WaitStrategy`].

pub mod ring_buffer;
pub mod sequencer;
pub mod wait_strategy;

pub use ring_buffer::{ProducerType, RingBuffer, SequenceBarrier};
pub use sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer, INITIAL_SEQUENCE};
pub use wait_strategy::{BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, WaitStrategy, YieldingWaitStrategy};

use std::sync::Arc;

use crate::constants::DEFAULT_RING_BUFFER_SIZE;
use crate::error::{HeroMessagingError, Result};

/// Which [`WaitStrategy`] a [`RingBufferConfig`] should build.
#[derive(Debug, Clone, Copy)]
pub enum WaitStrategyType {
    BusySpin,
    Blocking,
    Sleeping,
    Yielding,
}

impl WaitStrategyType {
    fn build(self) -> Arc<dyn WaitStrategy> {
        match self {
            WaitStrategyType::BusySpin => Arc::new(BusySpinWaitStrategy),
            WaitStrategyType::Blocking => Arc::new(BlockingWaitStrategy::default()),
            WaitStrategyType::Sleeping => Arc::new(SleepingWaitStrategy::default()),
            WaitStrategyType::Yielding => Arc::new(YieldingWaitStrategy::default()),
        }
    }
}

/// Builder for a [`RingBuffer`]: size, producer arity, and wait strategy.
#[derive(Debug, Clone, Copy)]
pub struct RingBufferConfig {
    pub size: usize,
    pub producer_type: ProducerType,
    pub wait_strategy: WaitStrategyType,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self { size: DEFAULT_RING_BUFFER_SIZE, producer_type: ProducerType::Single, wait_strategy: WaitStrategyType::BusySpin }
    }
}

impl RingBufferConfig {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(HeroMessagingError::invalid_argument("ring buffer size must be a power of two greater than zero"));
        }
        Ok(Self { size, ..Default::default() })
    }

    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    pub fn with_wait_strategy(mut self, wait_strategy: WaitStrategyType) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    pub fn build<T>(&self, event_factory: impl Fn() -> T) -> Result<RingBuffer<T>> {
        RingBuffer::new(self.size, self.producer_type, self.wait_strategy.build(), event_factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_and_zero_size() {
        assert!(RingBufferConfig::new(0).is_err());
        assert!(RingBufferConfig::new(1023).is_err());
        assert!(RingBufferConfig::new(1024).is_ok());
    }

    #[test]
    fn builder_produces_a_working_ring_buffer() {
        let config = RingBufferConfig::new(8).unwrap().with_wait_strategy(WaitStrategyType::Yielding);
        let ring: RingBuffer<i64> = config.build(|| 0i64).unwrap();
        let seq = ring.next().unwrap();
        *ring.get(seq) = 99;
        ring.publish(seq);
        assert_eq!(*ring.get(seq), 99);
    }
}
