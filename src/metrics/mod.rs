//! Response-time ledger
//!
//! This module keeps a bounded ring of recent request latencies for the
//! operator status display. It is owned by the [`RestServer`](crate::RestServer)
//! and only touched from the application thread, so it needs no atomics or
//! locks of its own.

use std::collections::VecDeque;
use std::time::Duration;

/// Default number of samples kept
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

/// Statistics computed from the retained samples
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Number of retained samples
    pub count: usize,
    /// Slowest retained sample in milliseconds
    pub max_ms: u64,
    /// Arithmetic mean of the retained samples in milliseconds
    pub mean_ms: u64,
}

impl LedgerSnapshot {
    /// Maximum as `Duration`
    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Mean as `Duration`
    pub fn mean(&self) -> Duration {
        Duration::from_millis(self.mean_ms)
    }
}

/// Bounded ring of recent latencies
///
/// # Examples
///
/// ```rust
/// use restbridge::metrics::ResponseTimeLedger;
/// use std::time::Duration;
///
/// let mut ledger = ResponseTimeLedger::with_capacity(2);
/// ledger.record(Duration::from_millis(10));
/// ledger.record(Duration::from_millis(30));
/// ledger.record(Duration::from_millis(50));
///
/// let snapshot = ledger.snapshot();
/// assert_eq!(snapshot.count, 2);
/// assert_eq!(snapshot.max_ms, 50);
/// assert_eq!(snapshot.mean_ms, 40);
/// ```
#[derive(Debug, Clone)]
pub struct ResponseTimeLedger {
    samples: VecDeque<u64>,
    capacity: usize,
    recorded: u64,
}

impl Default for ResponseTimeLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl ResponseTimeLedger {
    /// Create a ledger keeping the `capacity` most recent samples
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "Ledger capacity must be greater than 0");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            recorded: 0,
        }
    }

    /// Append a sample, evicting the oldest once capacity is exceeded
    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples
            .push_back(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self.recorded += 1;
    }

    /// Count, maximum and mean of the retained samples
    pub fn snapshot(&self) -> LedgerSnapshot {
        let count = self.samples.len();
        if count == 0 {
            return LedgerSnapshot::default();
        }
        let max_ms = self.samples.iter().copied().max().unwrap_or(0);
        let total: u128 = self.samples.iter().map(|&ms| u128::from(ms)).sum();
        LedgerSnapshot {
            count,
            max_ms,
            mean_ms: (total / count as u128) as u64,
        }
    }

    /// Retained samples in milliseconds, oldest first
    pub fn samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().copied()
    }

    /// Number of samples ever recorded, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.recorded
    }

    /// Maximum number of retained samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all samples; the lifetime counter is kept
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
