//! Power-of-two slot array over a [`super::sequencer::Sequencer`] (C2).

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{HeroMessagingError, Result};

use super::sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer, INITIAL_SEQUENCE};
use super::wait_strategy::WaitStrategy;

/// Single-producer claim/publish uses a plain increment; multi-producer
/// uses atomic fetch-add with per-slot availability marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerType {
    Single,
    Multi,
}

/// A consumer-side handle used to wait for and read published sequences,
/// gated by zero or more upstream dependents.
pub struct SequenceBarrier {
    sequencer: Arc<dyn Sequencer>,
    wait_strategy: Arc<dyn WaitStrategy>,
    alive: Arc<AtomicBool>,
    dependents: Vec<Arc<AtomicI64>>,
}

impl SequenceBarrier {
    /// Block (per the wait strategy) until `sequence` is readable,
    /// returning the highest contiguous sequence actually available
    /// (`>= sequence`), clamped by any dependent barriers.
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        let sequencer = self.sequencer.clone();
        let current = move || sequencer.cursor();
        let available = self.wait_strategy.wait_for(sequence, &current, &self.alive)?;
        let mut highest = self.sequencer.get_highest_published_sequence(sequence, available);

        for dependent in &self.dependents {
            highest = highest.min(dependent.load(Ordering::Acquire));
        }
        Ok(highest)
    }

    pub fn signal(&self) {
        self.wait_strategy.signal_all_when_blocking();
    }
}

/// Pre-allocated slot array with claim/publish semantics delegated to a
/// [`Sequencer`]. Built with an `event_factory` that pre-fills every
/// slot so producers mutate in place rather than allocate per message.
pub struct RingBuffer<T> {
    slots: Vec<Mutex<T>>,
    buffer_size: usize,
    sequencer: Arc<dyn Sequencer>,
    wait_strategy: Arc<dyn WaitStrategy>,
    alive: Arc<AtomicBool>,
    consumer_sequences: Mutex<Vec<Arc<AtomicI64>>>,
}

impl<T> RingBuffer<T> {
    pub fn new(
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
        event_factory: impl Fn() -> T,
    ) -> Result<Self> {
        if !buffer_size.is_power_of_two() {
            return Err(HeroMessagingError::invalid_argument("buffer_size must be a power of two"));
        }

        let slots = (0..buffer_size).map(|_| Mutex::new(event_factory())).collect();
        let sequencer: Arc<dyn Sequencer> = match producer_type {
            ProducerType::Single => Arc::new(SingleProducerSequencer::new(buffer_size)),
            ProducerType::Multi => Arc::new(MultiProducerSequencer::new(buffer_size)),
        };

        Ok(Self {
            slots,
            buffer_size,
            sequencer,
            wait_strategy,
            alive: Arc::new(AtomicBool::new(true)),
            consumer_sequences: Mutex::new(Vec::new()),
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Claim the next sequence, blocking while claiming it would lap a
    /// registered consumer that hasn't caught up yet.
    pub fn next(&self) -> Result<i64> {
        self.next_n(1)
    }

    pub fn next_n(&self, n: i64) -> Result<i64> {
        let claimed = self.sequencer.next(n)?;
        self.wait_for_consumers(claimed);
        Ok(claimed)
    }

    fn wait_for_consumers(&self, claimed: i64) {
        let wrap_point = claimed - self.buffer_size as i64;
        if wrap_point < 0 {
            return;
        }
        loop {
            let min_consumer = self.min_consumer_sequence();
            if wrap_point <= min_consumer {
                return;
            }
            std::hint::spin_loop();
        }
    }

    fn min_consumer_sequence(&self) -> i64 {
        self.consumer_sequences
            .lock()
            .iter()
            .map(|s| s.load(Ordering::Acquire))
            .min()
            .unwrap_or(i64::MAX)
    }

    /// The pre-allocated slot at `sequence mod buffer_size`; mutate it in
    /// place before calling `publish`.
    pub fn get(&self, sequence: i64) -> MutexGuard<'_, T> {
        self.slots[(sequence.rem_euclid(self.buffer_size as i64)) as usize].lock()
    }

    pub fn publish(&self, sequence: i64) {
        self.sequencer.publish(sequence, sequence, self.wait_strategy.as_ref());
    }

    pub fn publish_range(&self, lo: i64, hi: i64) {
        self.sequencer.publish(lo, hi, self.wait_strategy.as_ref());
    }

    /// Register a new consumer barrier. `dependents` lets a downstream
    /// stage wait on upstream consumers in addition to the producer
    /// cursor (multi-stage pipelines).
    pub fn new_barrier(&self, dependents: Vec<Arc<AtomicI64>>) -> (SequenceBarrier, Arc<AtomicI64>) {
        let consumer_sequence = Arc::new(AtomicI64::new(INITIAL_SEQUENCE));
        self.consumer_sequences.lock().push(consumer_sequence.clone());
        let barrier = SequenceBarrier {
            sequencer: self.sequencer.clone(),
            wait_strategy: self.wait_strategy.clone(),
            alive: self.alive.clone(),
            dependents,
        };
        (barrier, consumer_sequence)
    }

    /// Highest published sequence, or `-1` if none.
    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor()
    }

    pub fn remaining_capacity(&self) -> i64 {
        self.buffer_size as i64 - (self.sequencer.cursor() - self.min_consumer_sequence()).max(0)
    }

    /// Stop producers/consumers blocked in `next`/`wait_for`.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }
}
