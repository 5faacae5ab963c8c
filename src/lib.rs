//! A multi-threaded storage I/O load generator and verifier.
//!
//! Drives a configurable, sustained workload against one or more
//! directories, files, or block devices; measures per-operation latency
//! and aggregate bandwidth; and can read data back to confirm byte-for-byte
//! correctness against a self-describing on-disk pattern.
//!
//! # Architecture
//!
//! - **Thread manager** ([`worker`]) keeps a target population of worker
//!   threads running and aggregates their [`stats::PerfStats`] on a fixed
//!   reporting cadence ([`report`]).
//! - **Pattern codec** ([`pattern`]) lays out the self-describing block
//!   header/payload format that lets a reader recover block size and file
//!   size from any valid block.
//! - **Timed I/O** ([`io`]) wraps every read/write in latency measurement
//!   and rate pacing.
//! - **Command channel** ([`command`]) retargets the running thread count
//!   while work is in flight.
//! - **Drivers** ([`driver`]) implement the three workload families:
//!   create, copy, and read/verify.

pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod io;
pub mod pattern;
pub mod report;
pub mod signals;
pub mod stats;
pub mod util;
pub mod worker;

pub use config::{Mode, RunConfig};
pub use error::LoadgenError;

/// Result type used throughout the crate's outer boundary (CLI, driver
/// setup). Internally, functions that report one of the five error
/// categories return [`LoadgenError`] directly so callers can inspect
/// `.bits()`.
pub type Result<T> = anyhow::Result<T>;
