//! Latency histogram and throughput statistics.

pub mod perfstats;

pub use perfstats::{num_buckets, set_bucket_limits, PerfStats};
