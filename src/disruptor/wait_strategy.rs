//! Wait strategies controlling how a ring buffer consumer waits for a
//! sequence to become available (C1).

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{HeroMessagingError, Result};

/// How a consumer waits for `sequence` to be published. `current` is
/// polled repeatedly rather than read once, since the producer may
/// publish more while a strategy spins/parks.
pub trait WaitStrategy: Send + Sync {
    /// Returns the observed value of `current()` once it is `>=
    /// sequence`, or `InvalidState` if `alive` was cleared while waiting.
    fn wait_for(&self, sequence: i64, current: &dyn Fn() -> i64, alive: &AtomicBool) -> Result<i64>;

    /// Wake any thread parked in `wait_for` after a publish. No-op for
    /// strategies that never park.
    fn signal_all_when_blocking(&self);
}

fn check_alive(alive: &AtomicBool) -> Result<()> {
    if alive.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(HeroMessagingError::invalid_state("ring buffer was shut down"))
    }
}

/// Tight spin loop. Lowest latency, consumes a full core.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(&self, sequence: i64, current: &dyn Fn() -> i64, alive: &AtomicBool) -> Result<i64> {
        loop {
            let available = current();
            if available >= sequence {
                return Ok(available);
            }
            check_alive(alive)?;
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Mutex + condition variable. Balanced latency and CPU usage.
pub struct BlockingWaitStrategy {
    mutex: parking_lot::Mutex<()>,
    condition: parking_lot::Condvar,
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self { mutex: parking_lot::Mutex::new(()), condition: parking_lot::Condvar::new() }
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(&self, sequence: i64, current: &dyn Fn() -> i64, alive: &AtomicBool) -> Result<i64> {
        loop {
            let available = current();
            if available >= sequence {
                return Ok(available);
            }
            check_alive(alive)?;

            let mut guard = self.mutex.lock();
            let available = current();
            if available >= sequence {
                return Ok(available);
            }
            self.condition.wait_for(&mut guard, Duration::from_millis(50));
        }
    }

    fn signal_all_when_blocking(&self) {
        self.condition.notify_all();
    }
}

/// Spin a bounded number of times, then yield the thread, then sleep
/// with increasing backoff. Lowest CPU usage at the cost of latency.
pub struct SleepingWaitStrategy {
    spin_tries: u32,
    yield_tries: u32,
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self { spin_tries: 100, yield_tries: 100 }
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(&self, sequence: i64, current: &dyn Fn() -> i64, alive: &AtomicBool) -> Result<i64> {
        let mut counter = 0u32;
        loop {
            let available = current();
            if available >= sequence {
                return Ok(available);
            }
            check_alive(alive)?;

            if counter < self.spin_tries {
                std::hint::spin_loop();
            } else if counter < self.spin_tries + self.yield_tries {
                thread::yield_now();
            } else {
                let backoff = (counter - self.spin_tries - self.yield_tries).min(1_000);
                thread::sleep(Duration::from_micros(backoff as u64 + 1));
            }
            counter += 1;
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Spin, then yield. Moderate CPU usage and latency.
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self { spin_tries: 100 }
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(&self, sequence: i64, current: &dyn Fn() -> i64, alive: &AtomicBool) -> Result<i64> {
        let mut counter = 0u32;
        loop {
            let available = current();
            if available >= sequence {
                return Ok(available);
            }
            check_alive(alive)?;

            if counter < self.spin_tries {
                std::hint::spin_loop();
            } else {
                thread::yield_now();
            }
            counter += 1;
        }
    }

    fn signal_all_when_blocking(&self) {}
}
