//! Read-back driver: re-reads files a create/copy run left behind,
//! optionally checking pattern headers and payload, or byte-comparing
//! against a source tree (compare mode).

use crate::command::CommandChannel;
use crate::config::RunConfig;
use crate::driver::scan_files;
use crate::error;
use crate::io::{seek_to, timed_read};
use crate::pattern;
use crate::stats::PerfStats;
use crate::util::bufset::BufferSet;
use crate::util::checkpath::{checkdev, checkdir, checkfile};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MAX_THREADS: usize = 100;

/// Read back `config.targets[0]`, comparing against `config.source` when
/// present, else verifying pattern headers/data when `config.verify` is set.
pub fn run(
    config: Arc<RunConfig>,
    shutdown: Arc<AtomicBool>,
    commands: &mut CommandChannel,
    zombie: bool,
) -> u32 {
    let target = &config.targets[0].path;
    let onefile = checkdev(target) || checkfile(target);

    let files: Vec<PathBuf> = if onefile {
        vec![target.clone()]
    } else {
        match checkdir(target, false, config.simulate) {
            Ok(()) => {}
            Err(e) => {
                eprintln!("FATAL: target directory {}: {e}", target.display());
                return error::TARGET_DIRECTORY;
            }
        }
        match scan_files(target) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("FATAL: unable to scan target directory {}: {e}", target.display());
                return error::TARGET_DIRECTORY;
            }
        }
    };

    if let Some(source) = &config.source {
        if let Err(e) = checkdir(source, false, config.simulate) {
            eprintln!("FATAL: source directory {}: {e}", source.display());
            return error::SOURCE_DIRECTORY;
        }
    }

    let cursor = Arc::new(AtomicUsize::new(0));
    let files = Arc::new(files);
    let cfg = config.clone();

    let pool_size = if config.threads > 0 { config.threads as usize } else { MAX_THREADS };
    let names: Vec<String> = (0..pool_size).map(|i| format!("Read Thread {i:04}")).collect();

    let job: crate::worker::Job = {
        let files = files.clone();
        let cursor = cursor.clone();
        Arc::new(move |idx, name, running, stats| {
            let bits = worker_body(idx, &name, &files, &cursor, &cfg, &stats);
            let _ = running;
            bits
        })
    };

    let mut mgr = crate::worker::ThreadManager::new(names);
    let status = mgr.manage(
        job,
        config.threads as usize,
        std::time::Duration::from_secs(config.update_secs as u64),
        config.halt,
        &shutdown,
        commands,
        zombie,
        Some(&config.tag),
    );

    if status == 0 && config.delete && !onefile {
        let _ = std::fs::remove_dir(target);
    }

    status
}

fn worker_body(
    _idx: usize,
    name: &str,
    files: &[PathBuf],
    cursor: &AtomicUsize,
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> u32 {
    if config.debug.enabled(crate::config::debugopts::D_THREADS) {
        eprintln!("# Starting {name}");
    }

    let alignment = config.alignment();
    let bufsize = if config.bsize == 0 { pattern::max_bsize() } else { config.bsize };
    let depth = config.depth.max(1) as usize;
    let mut bufset = BufferSet::new(depth, bufsize as usize, alignment as usize);
    let buf_count = bufset.count();
    if buf_count == 0 {
        eprintln!("Unable to allocate ({bufsize} byte x {depth}) read buffers for {name}");
        return error::RESOURCE_ERROR;
    }
    let mut status = 0u32;
    let mut file_idx = 0usize;

    loop {
        let i = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(path) = files.get(i) else { break };

        let slot = file_idx % buf_count;
        let buf = bufset.buffer(slot).expect("slot within buf_count");
        file_idx += 1;

        let result = if let Some(source) = &config.source {
            compare_one(path, source, buf, config, stats)
        } else {
            read_one(path, buf, config, stats)
        };
        if let Err(bits) = result {
            status |= bits;
        }
    }

    status
}

fn read_one(
    path: &Path,
    buf: &mut [u8],
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> Result<(), u32> {
    let target = &config.targets[0];

    if config.simulate {
        return simulate_transfer(path, buf, config, stats);
    }

    let cstr = std::ffi::CString::new(path.as_os_str().as_encoded_bytes()).unwrap_or_default();
    let mut opts = libc::O_RDONLY;
    if config.direct > 0 {
        opts |= libc::O_DIRECT;
    }
    let fd = unsafe { libc::open(cstr.as_ptr(), opts) };
    if fd < 0 {
        eprintln!("Unable to open input file {}: {}", path.display(), std::io::Error::last_os_error());
        return Err(error::INPUT_FILE_ERROR);
    }

    let result = read_blocks(fd, path, buf, target.offset, config, stats);

    unsafe {
        libc::close(fd);
    }

    if result.is_ok() && config.delete {
        let _ = std::fs::remove_file(path);
    }

    result
}

fn read_blocks(
    fd: libc::c_int,
    path: &Path,
    buf: &mut [u8],
    base_offset: u64,
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> Result<(), u32> {
    if base_offset != 0 {
        seek_to(fd, base_offset).map_err(|e| e.bits())?;
    }

    let want = if config.bsize == 0 { buf.len() } else { config.bsize as usize };

    let first = {
        let mut s = stats.lock().unwrap();
        timed_read(fd, &mut buf[..want.min(buf.len())], &mut s, &path.to_string_lossy(), config.rate)
            .map_err(|e| e.bits())?
    };
    if first == 0 {
        return Ok(());
    }

    if config.verify || config.bsize == 0 || config.length == 0 {
        if let Err(e) = pattern::check_headers(buf, 0, base_offset) {
            eprintln!("File {}: {e}", path.display());
            return Err(error::INPUT_FILE_ERROR);
        }
        if config.verify {
            if let Err(e) = pattern::check_file(buf, path) {
                eprintln!("File {}: {e}", path.display());
                return Err(error::INPUT_FILE_ERROR);
            }
            if let Err(e) = pattern::check_data(buf, first) {
                eprintln!("File {}: {e}", path.display());
                return Err(error::INPUT_FILE_ERROR);
            }
        }
    }

    let bsize = if config.bsize != 0 { config.bsize } else { pattern::get_block_size(buf).max(1) };
    let fsize = if config.length != 0 { config.length } else { pattern::get_file_size(buf) };

    let mut read_total = first as u64;
    let mut offset = base_offset + first as u64;

    while fsize == 0 || read_total < fsize {
        let n = {
            let mut s = stats.lock().unwrap();
            timed_read(fd, &mut buf[..bsize as usize], &mut s, &path.to_string_lossy(), config.rate)
                .map_err(|e| e.bits())?
        };
        if n == 0 {
            break;
        }

        if config.verify {
            if let Err(e) = pattern::check_headers(buf, bsize, offset) {
                eprintln!("File {}: {e}", path.display());
                return Err(error::INPUT_FILE_ERROR);
            }
            if let Err(e) = pattern::check_data(buf, n) {
                eprintln!("File {}: {e}", path.display());
                return Err(error::INPUT_FILE_ERROR);
            }
        }

        read_total += n as u64;
        offset += n as u64;
    }

    stats.lock().unwrap().file_done();
    Ok(())
}

/// Simulated read: no file is opened, but the transfer still runs through
/// [`timed_read`] (with `fd = -1`) so stats and pacing still account for it.
/// There is no real pattern data to check, so header/content verification
/// is skipped regardless of `config.verify`.
fn simulate_transfer(
    path: &Path,
    buf: &mut [u8],
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> Result<(), u32> {
    let bsize = if config.bsize != 0 { config.bsize } else { buf.len() as u64 };
    let fsize = if config.length != 0 { config.length } else { bsize };

    let mut remaining = fsize;
    while remaining > 0 {
        let want = (remaining.min(bsize) as usize).max(1).min(buf.len());
        let mut s = stats.lock().unwrap();
        timed_read(-1, &mut buf[..want], &mut s, &path.to_string_lossy(), config.rate)
            .map_err(|e| e.bits())?;
        drop(s);
        remaining = remaining.saturating_sub(want as u64);
    }

    stats.lock().unwrap().file_done();
    Ok(())
}

fn compare_one(
    target_path: &Path,
    source_dir: &Path,
    buf: &mut [u8],
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> Result<(), u32> {
    let name = target_path.file_name().unwrap_or_default();
    let source_path = source_dir.join(name);

    if config.simulate {
        return simulate_compare(target_path, &source_path, buf, config, stats);
    }

    let t_cstr = std::ffi::CString::new(target_path.as_os_str().as_encoded_bytes()).unwrap_or_default();
    let tfd = unsafe { libc::open(t_cstr.as_ptr(), libc::O_RDONLY) };
    if tfd < 0 {
        eprintln!(
            "Unable to open target file {}: {}",
            target_path.display(),
            std::io::Error::last_os_error()
        );
        return Err(error::INPUT_FILE_ERROR);
    }

    let s_cstr = std::ffi::CString::new(source_path.as_os_str().as_encoded_bytes()).unwrap_or_default();
    let sfd = unsafe { libc::open(s_cstr.as_ptr(), libc::O_RDONLY) };
    if sfd < 0 {
        eprintln!(
            "Unable to open source file {}: {}",
            source_path.display(),
            std::io::Error::last_os_error()
        );
        unsafe {
            libc::close(tfd);
        }
        return Err(error::SOURCE_DIRECTORY);
    }

    let half = buf.len() / 2;
    let (tbuf, sbuf) = buf.split_at_mut(half);

    let mut status = Ok(());
    loop {
        let tn = {
            let mut s = stats.lock().unwrap();
            match timed_read(tfd, tbuf, &mut s, &target_path.to_string_lossy(), config.rate) {
                Ok(n) => n,
                Err(e) => {
                    status = Err(e.bits());
                    break;
                }
            }
        };
        let sn = {
            let mut s = stats.lock().unwrap();
            match timed_read(sfd, sbuf, &mut s, &source_path.to_string_lossy(), config.rate) {
                Ok(n) => n,
                Err(e) => {
                    status = Err(e.bits());
                    break;
                }
            }
        };

        if tn != sn || tbuf[..tn] != sbuf[..sn] {
            eprintln!(
                "Copy comparison error between {} and {}",
                source_path.display(),
                target_path.display()
            );
            status = Err(error::INPUT_FILE_ERROR);
            break;
        }
        if tn == 0 {
            break;
        }
    }

    unsafe {
        libc::close(tfd);
        libc::close(sfd);
    }

    if status.is_ok() {
        stats.lock().unwrap().file_done();
    }
    status
}

/// Simulated compare: both sides run through [`timed_read`] with `fd = -1`
/// so stats/pacing account for the transfer without opening either file.
fn simulate_compare(
    target_path: &Path,
    source_path: &Path,
    buf: &mut [u8],
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> Result<(), u32> {
    let half = buf.len() / 2;
    let (tbuf, sbuf) = buf.split_at_mut(half);

    let bsize = if config.bsize != 0 { config.bsize } else { half as u64 };
    let fsize = if config.length != 0 { config.length } else { bsize };

    let mut remaining = fsize;
    while remaining > 0 {
        let want = (remaining.min(bsize) as usize).max(1).min(half);
        {
            let mut s = stats.lock().unwrap();
            timed_read(-1, &mut tbuf[..want], &mut s, &target_path.to_string_lossy(), config.rate)
                .map_err(|e| e.bits())?;
        }
        {
            let mut s = stats.lock().unwrap();
            timed_read(-1, &mut sbuf[..want], &mut s, &source_path.to_string_lossy(), config.rate)
                .map_err(|e| e.bits())?;
        }
        remaining = remaining.saturating_sub(want as u64);
    }

    stats.lock().unwrap().file_done();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DebugOpts, Mode, Target};
    use crate::stats::set_bucket_limits;
    use std::sync::Once;
    use tempfile::TempDir;

    static INIT: Once = Once::new();
    fn ensure_limits() {
        INIT.call_once(|| set_bucket_limits(crate::stats::perfstats::DEFAULT_LIMITS));
    }

    fn config(target: PathBuf, source: Option<PathBuf>, verify: bool) -> RunConfig {
        RunConfig {
            mode: Mode::Read,
            tag: "test".into(),
            targets: vec![Target { path: target, offset: 0 }],
            source,
            bsize: 4096,
            length: 8192,
            data: 0,
            maxfiles: 0,
            threads: 1,
            update_secs: 1,
            rate: 0,
            direct: 0,
            depth: 1,
            random: 0,
            verify,
            rewrite: false,
            delete: false,
            sync: false,
            halt: false,
            simulate: false,
            onceonly: false,
            debug: DebugOpts::default(),
        }
    }

    fn write_pattern_file(path: &Path, tag: &str, bsize: usize, fsize: u64) {
        let mut buf = vec![0u8; bsize];
        pattern::run_header(&mut buf, tag);
        pattern::thread_header(&mut buf, &path.parent().unwrap().to_string_lossy());
        pattern::file_header(&mut buf, path, fsize);
        pattern::fill_data(&mut buf, bsize);

        let mut data = Vec::with_capacity(fsize as usize);
        let mut offset = 0u64;
        while (data.len() as u64) < fsize {
            pattern::block_header(&mut buf, bsize as u64, offset);
            data.extend_from_slice(&buf);
            offset += bsize as u64;
        }
        data.truncate(fsize as usize);
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn verifies_a_well_formed_pattern_file() {
        ensure_limits();
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("FILE_000000");
        write_pattern_file(&file, "t", 4096, 8192);

        let cfg = Arc::new(config(dir.path().to_path_buf(), None, true));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();

        let status = run(cfg, shutdown, &mut commands, false);
        assert_eq!(status, 0);
    }

    #[test]
    fn detects_corrupted_pattern_data() {
        ensure_limits();
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("FILE_000000");
        write_pattern_file(&file, "t", 4096, 8192);
        let mut bytes = std::fs::read(&file).unwrap();
        bytes[300] ^= 0xFF;
        std::fs::write(&file, bytes).unwrap();

        let cfg = Arc::new(config(dir.path().to_path_buf(), None, true));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();

        let status = run(cfg, shutdown, &mut commands, false);
        assert_eq!(status, error::INPUT_FILE_ERROR);
    }

    #[test]
    fn compare_mode_accepts_identical_trees() {
        ensure_limits();
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("a.bin"), vec![0x11u8; 4096]).unwrap();
        std::fs::write(dst.path().join("a.bin"), vec![0x11u8; 4096]).unwrap();

        let cfg = Arc::new(config(dst.path().to_path_buf(), Some(src.path().to_path_buf()), false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();

        let status = run(cfg, shutdown, &mut commands, false);
        assert_eq!(status, 0);
    }

    #[test]
    fn simulate_mode_accounts_for_bytes_without_reading_real_data() {
        ensure_limits();
        let dir = TempDir::new().unwrap();
        // Garbage, not a valid pattern file: simulate mode never opens it,
        // so this must still succeed even with verify-like config set.
        std::fs::write(dir.path().join("FILE_000000"), vec![0u8; 16]).unwrap();

        let mut cfg = config(dir.path().to_path_buf(), None, true);
        cfg.simulate = true;
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();

        let status = run(Arc::new(cfg), shutdown, &mut commands, false);
        assert_eq!(status, 0);
    }

    #[test]
    fn compare_mode_flags_mismatched_bytes() {
        ensure_limits();
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("a.bin"), vec![0x11u8; 4096]).unwrap();
        std::fs::write(dst.path().join("a.bin"), vec![0x22u8; 4096]).unwrap();

        let cfg = Arc::new(config(dst.path().to_path_buf(), Some(src.path().to_path_buf()), false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut commands = CommandChannel::new();

        let status = run(cfg, shutdown, &mut commands, false);
        assert_eq!(status, error::INPUT_FILE_ERROR);
    }
}
