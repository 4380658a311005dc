//! Time source abstraction
//!
//! Accrual depends only on whole seconds since the Unix epoch. The engine
//! reads time through [`Clock`] so tests can drive accrual deterministically.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Source of the engine's accrual clock
pub trait Clock: Send + Sync {
    /// Current time, whole seconds since the Unix epoch
    fn unix_now(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> u64 {
        // Pre-epoch wall clocks read as zero rather than wrapping.
        Utc::now().timestamp().max(0) as u64
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given second
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Jump the clock to an absolute second
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advance the clock by a number of seconds
    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
