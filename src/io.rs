//! Rate-paced, latency-timed reads and writes against a raw file descriptor.
//!
//! Every byte that crosses a target's boundary goes through [`timed_write`]
//! or [`timed_read`] so that a single histogram can account for both short
//! and full-sized transfers, and so that rate limiting applies uniformly
//! regardless of which driver issued the I/O.

use crate::error::LoadgenError;
use crate::stats::PerfStats;
use crate::util::time::{pace, Clock};
use std::os::unix::io::RawFd;

/// Write `buf` to `fd`, demanding the whole buffer land in one call.
///
/// A short write is treated the same as an OS-level error: the original
/// tool never retries a partial write, since on a regular file or block
/// device a short write below a caller-chosen size is itself a sign of
/// trouble worth surfacing rather than papering over.
///
/// `fd < 0` is simulation mode: no I/O happens, the full length is
/// pretended to have transferred, and stats/pacing still run.
pub fn timed_write(
    fd: RawFd,
    buf: &[u8],
    stats: &mut PerfStats,
    name: &str,
    rate_bps: u64,
) -> Result<(), LoadgenError> {
    let start = Clock::now();
    let ret = if fd < 0 {
        buf.len() as isize
    } else {
        unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) }
    };
    if ret < 0 || ret as usize != buf.len() {
        return Err(LoadgenError::OutputFile(format!(
            "write error to file {name}: {}",
            std::io::Error::last_os_error()
        )));
    }

    let elapsed = start.elapsed_us();
    stats.xfer_done(buf.len() as u64, elapsed);
    pace(buf.len() as u64, elapsed, rate_bps);
    Ok(())
}

/// Read up to `buf.len()` bytes from `fd`, returning the actual count read
/// (which may be less than `buf.len()` at end-of-file).
///
/// `fd < 0` is simulation mode: no I/O happens, a full read is pretended,
/// and stats/pacing still run.
pub fn timed_read(
    fd: RawFd,
    buf: &mut [u8],
    stats: &mut PerfStats,
    name: &str,
    rate_bps: u64,
) -> Result<usize, LoadgenError> {
    let start = Clock::now();
    let ret = if fd < 0 {
        buf.len() as isize
    } else {
        unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) }
    };
    if ret < 0 {
        return Err(LoadgenError::InputFile(format!(
            "data read error on input file {name}: {}",
            std::io::Error::last_os_error()
        )));
    }

    let elapsed = start.elapsed_us();
    stats.xfer_done(ret as u64, elapsed);
    pace(buf.len() as u64, elapsed, rate_bps);
    Ok(ret as usize)
}

/// Reposition `fd` to `offset` bytes from the start of the file.
pub fn seek_to(fd: RawFd, offset: u64) -> Result<(), LoadgenError> {
    let ret = unsafe { libc::lseek(fd, offset as libc::off_t, libc::SEEK_SET) };
    if ret < 0 {
        return Err(LoadgenError::InputFile(format!(
            "seek error: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}
