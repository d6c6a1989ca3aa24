//! Strictly increasing microsecond timestamps.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Wall clock that never returns the same instant twice.
///
/// Every mutation and every captured sync watermark draws from one clock per
/// store, so no two of them share a stamp and ordering by `updated_at` is total.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the clock so it never goes below an already persisted stamp.
    pub fn starting_after(micros: i64) -> Self {
        Self {
            last: AtomicI64::new(micros),
        }
    }

    /// Next stamp in microseconds since the Unix epoch.
    pub fn tick_micros(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn tick(&self) -> DateTime<Utc> {
        from_micros(self.tick_micros())
    }
}

/// Convert stored microseconds back into a timestamp.
pub(crate) fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}
