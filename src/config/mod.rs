//! Immutable run configuration, built once from the CLI surface and shared
//! read-only by every driver and worker for the lifetime of the run.

pub mod cli;
pub mod cli_convert;
pub mod debugopts;

pub use debugopts::DebugOpts;

use std::path::PathBuf;

/// Which workload family this run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Generate pattern files under the target(s).
    Create,
    /// Duplicate a source tree into the target.
    Copy,
    /// Read back existing files, optionally verifying pattern correctness.
    Read,
}

/// One `PATH[:OFFSET]` target, post-lexing.
#[derive(Debug, Clone)]
pub struct Target {
    pub path: PathBuf,
    pub offset: u64,
}

/// Fully-resolved, read-only run configuration. Constructed once by
/// [`cli_convert`] and shared behind an `Arc` by every driver/worker.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub tag: String,
    pub targets: Vec<Target>,
    pub source: Option<PathBuf>,
    pub bsize: u64,
    pub length: u64,
    pub data: u64,
    pub maxfiles: u32,
    pub threads: u32,
    pub update_secs: u32,
    pub rate: u64,
    pub direct: u32,
    pub depth: u32,
    pub random: u64,
    pub verify: bool,
    pub rewrite: bool,
    pub delete: bool,
    pub sync: bool,
    pub halt: bool,
    pub simulate: bool,
    pub onceonly: bool,
    pub debug: DebugOpts,
}

impl RunConfig {
    /// Create-options bitmask for `O_CREAT`/`O_TRUNC`/`O_DSYNC`/`O_DIRECT`,
    /// exactly mirroring `writeParms`'s constructor.
    pub fn create_opts(&self) -> libc::c_int {
        let mut opts = libc::O_CREAT;
        if !self.rewrite {
            opts |= libc::O_TRUNC;
        }
        if self.sync {
            opts |= libc::O_DSYNC;
        }
        if self.direct > 0 {
            opts |= libc::O_DIRECT;
        }
        opts
    }

    pub fn alignment(&self) -> u64 {
        const DEFAULT_ALIGNMENT: u64 = 8192;
        if self.direct > 0 {
            self.direct as u64
        } else {
            DEFAULT_ALIGNMENT
        }
    }
}
