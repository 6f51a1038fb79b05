//! Sequence claim/publish strategies (C1): single-producer (plain
//! increment) and multi-producer (atomic fetch-add with an availability
//! buffer for gap detection).

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use crate::error::{HeroMessagingError, Result};

/// The value of a sequence that has published nothing yet.
pub const INITIAL_SEQUENCE: i64 = -1;

/// A sequence counter padded to its own cache line. Isolates a hot
/// cross-thread cursor from whatever sits next to it in the struct so
/// readers spinning on it don't contend with an unrelated writer.
#[repr(align(64))]
struct PaddedSequence {
    value: AtomicI64,
    _padding: [u8; crate::constants::CACHE_LINE_SIZE - std::mem::size_of::<AtomicI64>()],
}

impl PaddedSequence {
    fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
            _padding: [0; crate::constants::CACHE_LINE_SIZE - std::mem::size_of::<AtomicI64>()],
        }
    }
}

/// Claims and publishes sequences on a ring buffer of `buffer_size`
/// slots (always a power of two).
pub trait Sequencer: Send + Sync {
    /// Claim the next `n` sequences, returning the highest one claimed.
    /// Fails with `InvalidArgument` when `n <= 0` or `n > buffer_size`.
    fn next(&self, n: i64) -> Result<i64>;

    /// Mark `[lo, hi]` as published and wake any waiting consumers.
    fn publish(&self, lo: i64, hi: i64, wait_strategy: &dyn super::wait_strategy::WaitStrategy);

    /// Whether `sequence` is currently readable.
    fn is_available(&self, sequence: i64) -> bool;

    /// Greatest contiguously-published sequence in `[lo, hi]`; stops at
    /// the first gap.
    fn get_highest_published_sequence(&self, lo: i64, hi: i64) -> i64;

    /// Highest sequence whose claim has been acknowledged. For
    /// single-producer this equals the last publish; for multi-producer
    /// it is the highest claim (readability still gated by
    /// `get_highest_published_sequence`).
    fn cursor(&self) -> i64;

    fn buffer_size(&self) -> usize;
}

fn validate_batch(n: i64, buffer_size: usize) -> Result<()> {
    if n <= 0 || n as usize > buffer_size {
        Err(HeroMessagingError::invalid_argument(format!(
            "batch count must be in 1..={buffer_size}, got {n}"
        )))
    } else {
        Ok(())
    }
}

/// Single producer: plain increment, no atomics needed across producers.
pub struct SingleProducerSequencer {
    buffer_size: usize,
    claimed: AtomicI64,
    /// Read by consumer threads on every `is_available`/`cursor()` call;
    /// padded so it doesn't share a cache line with `claimed`.
    cursor: PaddedSequence,
}

impl SingleProducerSequencer {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size, claimed: AtomicI64::new(INITIAL_SEQUENCE), cursor: PaddedSequence::new(INITIAL_SEQUENCE) }
    }
}

impl Sequencer for SingleProducerSequencer {
    fn next(&self, n: i64) -> Result<i64> {
        validate_batch(n, self.buffer_size)?;
        let current = self.claimed.load(Ordering::Relaxed);
        let next = current + n;
        self.claimed.store(next, Ordering::Relaxed);
        Ok(next)
    }

    fn publish(&self, _lo: i64, hi: i64, wait_strategy: &dyn super::wait_strategy::WaitStrategy) {
        self.cursor.value.store(hi, Ordering::Release);
        wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.value.load(Ordering::Acquire)
    }

    fn get_highest_published_sequence(&self, lo: i64, hi: i64) -> i64 {
        let available = self.cursor.value.load(Ordering::Acquire);
        if available < lo {
            lo - 1
        } else {
            available.min(hi)
        }
    }

    fn cursor(&self) -> i64 {
        self.cursor.value.load(Ordering::Acquire)
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// Multiple producers: atomic fetch-add claim, per-slot availability
/// marking so readers can detect gaps left by a producer that claimed
/// but hasn't published yet.
pub struct MultiProducerSequencer {
    buffer_size: usize,
    /// Claimed by every producer thread via `fetch_add`; padded so
    /// contention here doesn't spill into `available`'s first slots.
    claimed: PaddedSequence,
    /// `available[s % buffer_size]` holds the wrap "round" (`s /
    /// buffer_size`) once `s` is published; `-1` means unpublished.
    available: Vec<AtomicI32>,
}

impl MultiProducerSequencer {
    pub fn new(buffer_size: usize) -> Self {
        let available = (0..buffer_size).map(|_| AtomicI32::new(-1)).collect();
        Self { buffer_size, claimed: PaddedSequence::new(INITIAL_SEQUENCE), available }
    }

    fn round_of(&self, sequence: i64) -> i32 {
        (sequence / self.buffer_size as i64) as i32
    }

    fn index_of(&self, sequence: i64) -> usize {
        (sequence.rem_euclid(self.buffer_size as i64)) as usize
    }
}

impl Sequencer for MultiProducerSequencer {
    fn next(&self, n: i64) -> Result<i64> {
        validate_batch(n, self.buffer_size)?;
        Ok(self.claimed.value.fetch_add(n, Ordering::AcqRel) + n)
    }

    fn publish(&self, lo: i64, hi: i64, wait_strategy: &dyn super::wait_strategy::WaitStrategy) {
        for sequence in lo..=hi {
            let round = self.round_of(sequence);
            self.available[self.index_of(sequence)].store(round, Ordering::Release);
        }
        wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        if sequence < 0 {
            return true;
        }
        self.available[self.index_of(sequence)].load(Ordering::Acquire) == self.round_of(sequence)
    }

    fn get_highest_published_sequence(&self, lo: i64, hi: i64) -> i64 {
        let mut sequence = lo;
        while sequence <= hi {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
            sequence += 1;
        }
        hi
    }

    fn cursor(&self) -> i64 {
        self.claimed.value.load(Ordering::Acquire)
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::wait_strategy::BusySpinWaitStrategy;

    #[test]
    fn single_producer_rejects_non_positive_and_oversized_batches() {
        let sequencer = SingleProducerSequencer::new(8);
        assert!(sequencer.next(0).is_err());
        assert!(sequencer.next(9).is_err());
    }

    #[test]
    fn single_producer_publish_is_immediately_contiguous() {
        let sequencer = SingleProducerSequencer::new(8);
        let strategy = BusySpinWaitStrategy;
        let hi = sequencer.next(3).unwrap();
        sequencer.publish(0, hi, &strategy);
        assert_eq!(sequencer.get_highest_published_sequence(0, hi), hi);
        assert!(sequencer.is_available(hi));
    }

    #[test]
    fn multi_producer_detects_gap_from_unpublished_claim() {
        let sequencer = MultiProducerSequencer::new(8);
        let strategy = BusySpinWaitStrategy;

        let first = sequencer.next(1).unwrap();
        let second = sequencer.next(1).unwrap();
        // Publish the second claim before the first: a reader scanning
        // from 0 must stop at the gap left by the unpublished first slot.
        sequencer.publish(second, second, &strategy);
        assert_eq!(sequencer.get_highest_published_sequence(first, second), first - 1);

        sequencer.publish(first, first, &strategy);
        assert_eq!(sequencer.get_highest_published_sequence(first, second), second);
    }

    #[test]
    fn multi_producer_is_available_respects_wrap_round() {
        let sequencer = MultiProducerSequencer::new(4);
        let strategy = BusySpinWaitStrategy;
        for _ in 0..4 {
            let seq = sequencer.next(1).unwrap();
            sequencer.publish(seq, seq, &strategy);
        }
        assert!(sequencer.is_available(0));

        // Slot 0 gets reused on the second lap (sequence 4); its stored
        // round now belongs to sequence 4, not sequence 0.
        let wrapped = sequencer.next(1).unwrap();
        sequencer.publish(wrapped, wrapped, &strategy);
        assert!(!sequencer.is_available(0));
        assert!(sequencer.is_available(wrapped));
    }
}
