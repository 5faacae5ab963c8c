//! Per-worker latency histogram and throughput counters.
//!
//! Bucket boundaries are injected once, process-wide, before any worker
//! starts (see [`set_bucket_limits`]); every [`PerfStats`] instance shares
//! the same boundary vector and bucket count.

use std::sync::OnceLock;

/// Default latency ladder, in microseconds, matching the historical
/// defaults: 1..512000us in roughly-doubling steps.
pub const DEFAULT_LIMITS: &[i64] = &[
    1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1000, 2000, 4000, 8000, 16000, 32000, 64000, 128000,
    256000, 512000,
];

static BUCKET_LIMITS: OnceLock<Vec<i64>> = OnceLock::new();

/// Install the process-wide bucket boundary vector.
///
/// `limits` must be monotonically increasing and positive; a sentinel of
/// any non-positive value (or simply running out of entries) ends the
/// vector, mirroring the original's `setlimits`. Calling this more than
/// once has no effect after the first call wins.
pub fn set_bucket_limits(limits: &[i64]) {
    let bounded: Vec<i64> = limits.iter().take_while(|&&v| v > 0).copied().collect();
    let _ = BUCKET_LIMITS.set(bounded);
}

fn bucket_limits() -> &'static [i64] {
    BUCKET_LIMITS.get_or_init(|| DEFAULT_LIMITS.to_vec())
}

/// Number of latency buckets in effect for this process.
pub fn num_buckets() -> usize {
    bucket_limits().len()
}

/// Per-worker latency histogram and cumulative transfer counters.
///
/// `min_us == 0` is the "no sample yet" sentinel, not a legitimate
/// zero-latency sample.
#[derive(Debug, Clone)]
pub struct PerfStats {
    pub files_done: u64,
    pub bytes: u64,
    pub cum_us: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub buckets: Vec<u64>,
}

impl Default for PerfStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfStats {
    /// A freshly reset histogram sized to the current process-wide bucket count.
    pub fn new() -> Self {
        PerfStats {
            files_done: 0,
            bytes: 0,
            cum_us: 0,
            min_us: 0,
            max_us: 0,
            buckets: vec![0; num_buckets()],
        }
    }

    /// Zero every counter, keeping the current bucket count.
    pub fn reset(&mut self) {
        *self = PerfStats::new();
    }

    /// Record one completed transfer of `bytes` bytes taking `elapsed_us`
    /// microseconds: update totals, min/max, and bump the smallest bucket
    /// whose bound is `>= elapsed_us` (overflow falls into the last bucket).
    pub fn xfer_done(&mut self, bytes: u64, elapsed_us: u64) {
        self.bytes += bytes;
        self.cum_us += elapsed_us;
        if self.min_us == 0 || elapsed_us < self.min_us {
            self.min_us = elapsed_us;
        }
        if elapsed_us > self.max_us {
            self.max_us = elapsed_us;
        }

        let limits = bucket_limits();
        let mut idx = limits.len().saturating_sub(1);
        for (i, &bound) in limits.iter().enumerate() {
            if elapsed_us as i64 <= bound {
                idx = i;
                break;
            }
        }
        if let Some(slot) = self.buckets.get_mut(idx) {
            *slot += 1;
        }
    }

    /// Record completion of one file (independent of any transfer).
    pub fn file_done(&mut self) {
        self.files_done += 1;
    }
}

impl std::ops::AddAssign<&PerfStats> for PerfStats {
    fn add_assign(&mut self, rhs: &PerfStats) {
        self.files_done += rhs.files_done;
        self.bytes += rhs.bytes;
        self.cum_us += rhs.cum_us;
        if rhs.min_us != 0 && (self.min_us == 0 || rhs.min_us < self.min_us) {
            self.min_us = rhs.min_us;
        }
        if rhs.max_us > self.max_us {
            self.max_us = rhs.max_us;
        }
        for (a, b) in self.buckets.iter_mut().zip(rhs.buckets.iter()) {
            *a += b;
        }
    }
}

impl std::ops::SubAssign<&PerfStats> for PerfStats {
    /// Field-wise subtraction for computing per-interval deltas.
    ///
    /// `min_us`/`max_us` are *not* recomputed for the delta window here:
    /// they are left as whichever side's logic the caller already applied
    /// before calling this (typically the minuend's extrema), matching the
    /// original's documented imprecision for subtraction. See SPEC_FULL.md
    /// §9.
    fn sub_assign(&mut self, rhs: &PerfStats) {
        self.files_done = self.files_done.saturating_sub(rhs.files_done);
        self.bytes = self.bytes.saturating_sub(rhs.bytes);
        self.cum_us = self.cum_us.saturating_sub(rhs.cum_us);
        for (a, b) in self.buckets.iter_mut().zip(rhs.buckets.iter()) {
            *a = a.saturating_sub(*b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    // Bucket limits are a OnceLock; scope every test to the defaults by
    // initializing exactly once across the whole test binary.
    static INIT: Once = Once::new();
    fn ensure_default_limits() {
        INIT.call_once(|| set_bucket_limits(DEFAULT_LIMITS));
    }

    #[test]
    fn min_is_unset_until_first_sample() {
        ensure_default_limits();
        let mut s = PerfStats::new();
        assert_eq!(s.min_us, 0);
        s.xfer_done(100, 50);
        assert_eq!(s.min_us, 50);
        assert_eq!(s.max_us, 50);
        s.xfer_done(100, 10);
        assert_eq!(s.min_us, 10);
        assert_eq!(s.max_us, 50);
    }

    #[test]
    fn histogram_conservation() {
        ensure_default_limits();
        let mut s = PerfStats::new();
        for us in [1, 5, 50, 500, 5000, 50000, 600000] {
            s.xfer_done(10, us);
        }
        let total: u64 = s.buckets.iter().sum();
        assert_eq!(total, 7);
        assert_eq!(s.bytes, 70);
    }

    #[test]
    fn overflow_sample_falls_into_last_bucket() {
        ensure_default_limits();
        let mut s = PerfStats::new();
        s.xfer_done(1, 10_000_000);
        assert_eq!(s.buckets[num_buckets() - 1], 1);
    }

    #[test]
    fn add_then_subtract_is_identity_for_cumulative_fields() {
        ensure_default_limits();
        let mut a = PerfStats::new();
        a.xfer_done(100, 10);
        a.file_done();
        let mut b = PerfStats::new();
        b.xfer_done(200, 20);
        b.file_done();

        let mut sum = a.clone();
        sum += &b;
        let mut back = sum.clone();
        back -= &b;

        assert_eq!(back.files_done, a.files_done);
        assert_eq!(back.bytes, a.bytes);
        assert_eq!(back.cum_us, a.cum_us);
        assert_eq!(back.buckets, a.buckets);
    }

    #[test]
    fn file_done_does_not_touch_transfer_counters() {
        ensure_default_limits();
        let mut s = PerfStats::new();
        s.file_done();
        s.file_done();
        assert_eq!(s.files_done, 2);
        assert_eq!(s.bytes, 0);
    }
}
