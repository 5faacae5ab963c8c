//! Monotonic microsecond clock and the rate-pacing stall helper.

use std::thread;
use std::time::{Duration, Instant};

/// A monotonic instant, expressible in whole microseconds.
///
/// Wraps [`Instant`] rather than `gettimeofday`-style wall time, since the
/// pacer only ever needs elapsed durations, never a calendar timestamp.
#[derive(Debug, Clone, Copy)]
pub struct Clock(Instant);

impl Clock {
    /// Capture the current instant.
    pub fn now() -> Self {
        Clock(Instant::now())
    }

    /// Microseconds elapsed since this instant was captured.
    pub fn elapsed_us(&self) -> u64 {
        self.0.elapsed().as_micros() as u64
    }
}

/// Sleep the excess of `elapsed_us` over the byte-rate budget `rate_bps`,
/// if any.
///
/// `len` is the number of bytes the just-completed operation was *meant*
/// to transfer (the requested length, not necessarily the actual count),
/// matching the original pacer which paces against the request size even
/// for short reads.
pub fn pace(len: u64, elapsed_us: u64, rate_bps: u64) {
    if rate_bps == 0 {
        return;
    }
    let expected_us = 1_000_000u64.saturating_mul(len) / rate_bps;
    if expected_us > elapsed_us {
        thread::sleep(Duration::from_micros(expected_us - elapsed_us));
    }
}
