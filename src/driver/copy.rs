//! Copy driver: duplicates a flat source directory into a target directory,
//! one worker per thread slot, each handling whichever files are still
//! unclaimed (see [`driver::scan_files`] and SPEC_FULL.md §9 on the
//! single-level model).

use crate::command::CommandChannel;
use crate::config::RunConfig;
use crate::driver::scan_files;
use crate::error;
use crate::io::{timed_read, timed_write};
use crate::stats::PerfStats;
use crate::util::bufset::BufferSet;
use crate::util::checkpath::checkdir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MAX_THREADS: usize = 100;

/// Duplicate `config.source` into `config.targets[0]`.
pub fn run(
    config: Arc<RunConfig>,
    shutdown: Arc<AtomicBool>,
    commands: &mut CommandChannel,
    zombie: bool,
) -> u32 {
    let source = match &config.source {
        Some(s) => s.clone(),
        None => {
            eprintln!("FATAL: copy mode requires a source directory");
            return error::SOURCE_DIRECTORY;
        }
    };
    if let Err(e) = checkdir(&source, false, config.simulate) {
        eprintln!("FATAL: source directory {}: {e}", source.display());
        return error::SOURCE_DIRECTORY;
    }

    let target = config.targets[0].path.clone();
    if let Err(e) = checkdir(&target, true, config.simulate) {
        eprintln!("FATAL: target directory {}: {e}", target.display());
        return error::TARGET_DIRECTORY;
    }

    let files = match scan_files(&source) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("FATAL: unable to scan source directory {}: {e}", source.display());
            return error::SOURCE_DIRECTORY;
        }
    };

    let cursor = Arc::new(AtomicUsize::new(0));
    let files = Arc::new(files);
    let cfg = config.clone();
    let target = Arc::new(target);

    let pool_size = if config.threads > 0 { config.threads as usize } else { MAX_THREADS };
    let names: Vec<String> = (0..pool_size).map(|i| format!("Copy Thread {i:04}")).collect();

    let job: crate::worker::Job = {
        let files = files.clone();
        let cursor = cursor.clone();
        let target = target.clone();
        Arc::new(move |idx, name, running, stats| {
            let bits = worker_body(idx, &name, &files, &cursor, &target, &cfg, &stats);
            let _ = running;
            bits
        })
    };

    let mut mgr = crate::worker::ThreadManager::new(names);
    mgr.manage(
        job,
        config.threads as usize,
        std::time::Duration::from_secs(config.update_secs as u64),
        config.halt,
        &shutdown,
        commands,
        zombie,
        Some(&config.tag),
    )
}

fn worker_body(
    _idx: usize,
    name: &str,
    files: &[PathBuf],
    cursor: &AtomicUsize,
    target_dir: &Path,
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> u32 {
    if config.debug.enabled(crate::config::debugopts::D_THREADS) {
        eprintln!("# Starting {name}");
    }

    let alignment = config.alignment();
    let mut bufset = BufferSet::new(1, 1 << 20, alignment as usize);
    let mut status = 0u32;

    loop {
        let i = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(src_path) = files.get(i) else { break };

        let dst_path = target_dir.join(src_path.file_name().unwrap_or_default());
        let buf = match bufset.buffer(0) {
            Some(b) => b,
            None => {
                eprintln!("Unable to allocate copy buffer for {name}");
                return error::RESOURCE_ERROR;
            }
        };

        match copy_one(src_path, &dst_path, buf, config, stats) {
            Ok(()) => {}
            Err(bits) => status |= bits,
        }
    }

    status
}

fn copy_one(
    src: &Path,
    dst: &Path,
    buf: &mut [u8],
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> Result<(), u32> {
    if config.simulate {
        return simulate_copy(src, dst, buf, config, stats);
    }

    let src_cstr = std::ffi::CString::new(src.as_os_str().as_encoded_bytes()).unwrap_or_default();
    let rfd = unsafe { libc::open(src_cstr.as_ptr(), libc::O_RDONLY) };
    if rfd < 0 {
        eprintln!("Unable to open input file {}: {}", src.display(), std::io::Error::last_os_error());
        return Err(error::INPUT_FILE_ERROR);
    }

    let dst_cstr = std::ffi::CString::new(dst.as_os_str().as_encoded_bytes()).unwrap_or_default();
    let mut wopts = libc::O_WRONLY | config.create_opts();
    if config.sync {
        wopts |= libc::O_DSYNC;
    }
    let wfd = unsafe { libc::open(dst_cstr.as_ptr(), wopts, 0o666) };
    if wfd < 0 {
        eprintln!("Unable to create output file {}: {}", dst.display(), std::io::Error::last_os_error());
        unsafe {
            libc::close(rfd);
        }
        return Err(error::OUTPUT_FILE_ERROR);
    }

    let mut status = Ok(());
    loop {
        let n = unsafe { libc::read(rfd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            eprintln!(
                "Unable to read input file {}: {}",
                src.display(),
                std::io::Error::last_os_error()
            );
            status = Err(error::INPUT_FILE_ERROR);
            break;
        }
        if n == 0 {
            break;
        }

        let mut s = stats.lock().unwrap();
        if let Err(e) = timed_write(wfd, &buf[..n as usize], &mut s, &dst.to_string_lossy(), config.rate)
        {
            status = Err(e.bits());
            break;
        }
    }

    unsafe {
        libc::close(rfd);
        libc::close(wfd);
    }

    if status.is_ok() {
        stats.lock().unwrap().file_done();
    }
    status
}

/// Simulated copy: neither file is opened. The transfer still runs through
/// [`timed_read`]/[`timed_write`] (with `fd = -1`) so stats and pacing
/// account for it, using the source file's real size as the fake length.
fn simulate_copy(
    src: &Path,
    dst: &Path,
    buf: &mut [u8],
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> Result<(), u32> {
    let fsize = std::fs::metadata(src)
        .map(|m| m.len())
        .unwrap_or(if config.bsize != 0 { config.bsize } else { buf.len() as u64 });

    let mut remaining = fsize;
    while remaining > 0 {
        let want = (remaining.min(buf.len() as u64) as usize).max(1).min(buf.len());
        {
            let mut s = stats.lock().unwrap();
            timed_read(-1, &mut buf[..want], &mut s, &src.to_string_lossy(), config.rate)
                .map_err(|e| e.bits())?;
        }
        {
            let mut s = stats.lock().unwrap();
            timed_write(-1, &buf[..want], &mut s, &dst.to_string_lossy(), config.rate)
                .map_err(|e| e.bits())?;
        }
        remaining = remaining.saturating_sub(want as u64);
    }

    stats.lock().unwrap().file_done();
    Ok(())
}
