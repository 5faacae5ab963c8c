//! Create/rewrite driver: populates target directories (or devices/files)
//! with pattern-filled blocks.

use crate::command::CommandChannel;
use crate::config::RunConfig;
use crate::error;
use crate::io::{seek_to, timed_write};
use crate::pattern;
use crate::stats::PerfStats;
use crate::util::bufset::BufferSet;
use crate::util::checkpath::{checkdev, checkdir, checkfile};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

const MAX_THREADS: usize = 100;

#[derive(Clone)]
struct CreateParms {
    dir: PathBuf,
    single_file: bool,
    offset: u64,
}

/// Create pattern files under `config.targets`. One target scans (or
/// creates) up to `config.threads` per-thread subdirectories; more than one
/// target runs one worker per supplied path (list mode).
pub fn run(
    config: Arc<RunConfig>,
    shutdown: Arc<AtomicBool>,
    commands: &mut CommandChannel,
    zombie: bool,
) -> u32 {
    let (names, parms) = if config.targets.len() > 1 {
        match build_list_mode(&config) {
            Ok(v) => v,
            Err(bits) => return bits,
        }
    } else {
        match build_directory_mode(&config) {
            Ok(v) => v,
            Err(bits) => return bits,
        }
    };

    let initial = config.threads as usize;
    let parms = Arc::new(parms);
    let cfg = config.clone();

    let job: crate::worker::Job = {
        let parms = parms.clone();
        Arc::new(move |idx, name, running, stats| {
            let bits = worker_body(idx, &name, &parms[idx], &cfg, &stats);
            let _ = running; // cleared by the thread manager after this returns
            bits
        })
    };

    let mut mgr = crate::worker::ThreadManager::new(names);
    mgr.manage(
        job,
        initial,
        std::time::Duration::from_secs(config.update_secs as u64),
        config.halt,
        &shutdown,
        commands,
        zombie,
        Some(&config.tag),
    )
}

fn build_directory_mode(config: &RunConfig) -> Result<(Vec<String>, Vec<CreateParms>), u32> {
    let target = &config.targets[0];
    let onefile = checkdev(&target.path) || checkfile(&target.path);
    if !onefile {
        if let Err(e) = checkdir(&target.path, true, config.simulate) {
            eprintln!("FATAL: target directory {}: {}", target.path.display(), e);
            return Err(error::TARGET_DIRECTORY);
        }
    }

    let max_threads = if config.threads > 0 { config.threads as usize } else { MAX_THREADS };
    let mut names = Vec::with_capacity(max_threads);
    let mut parms = Vec::with_capacity(max_threads);
    for i in 0..max_threads {
        names.push(format!("Creator Thread {i:04}"));
        let dir = if onefile {
            target.path.clone()
        } else {
            target.path.join(format!("Thread{i:04}"))
        };
        parms.push(CreateParms { dir, single_file: onefile, offset: target.offset });
    }
    Ok((names, parms))
}

fn build_list_mode(config: &RunConfig) -> Result<(Vec<String>, Vec<CreateParms>), u32> {
    let mut names = Vec::with_capacity(config.targets.len());
    let mut parms = Vec::with_capacity(config.targets.len());
    for (i, target) in config.targets.iter().enumerate() {
        let single_file = checkdev(&target.path) || checkfile(&target.path);
        if !single_file {
            if let Err(e) = checkdir(&target.path, false, config.simulate) {
                eprintln!("FATAL: target directory {}: {}", target.path.display(), e);
                return Err(error::TARGET_DIRECTORY);
            }
        }
        names.push(format!("Creator Thread {i:04}"));
        parms.push(CreateParms { dir: target.path.clone(), single_file, offset: target.offset });
    }
    Ok((names, parms))
}

fn worker_body(
    _idx: usize,
    name: &str,
    parms: &CreateParms,
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> u32 {
    if config.debug.enabled(crate::config::debugopts::D_THREADS) {
        eprintln!("# Starting {name} in {}", parms.dir.display());
    }

    let mut maxfiles = config.maxfiles;
    if !parms.single_file {
        if let Err(e) = checkdir(&parms.dir, true, config.simulate) {
            eprintln!("FATAL: target directory {}: {e}", parms.dir.display());
            return error::TARGET_DIRECTORY;
        }
    } else {
        maxfiles = 1;
    }

    let alignment = config.alignment();
    let bufsize = if config.bsize == 0 { pattern::max_bsize() } else { config.bsize };
    let depth = config.depth.max(1) as usize;

    let mut bufset = BufferSet::new(depth, bufsize as usize, alignment as usize);
    let buf_count = bufset.count();
    if buf_count == 0 {
        eprintln!("Unable to allocate ({bufsize} byte x {depth}) data buffers for {name}");
        return error::RESOURCE_ERROR;
    }
    for i in 0..buf_count {
        let buf = bufset.buffer(i).expect("index within buf_count");
        pattern::run_header(buf, &config.tag);
        pattern::thread_header(buf, &parms.dir.to_string_lossy());
        pattern::fill_data(buf, bufsize as usize);
    }

    let mut status = 0u32;
    let mut done = 0u32;
    loop {
        if status != 0 {
            break;
        }
        if maxfiles > 0 && done >= maxfiles {
            break;
        }

        let path: PathBuf = if parms.single_file {
            parms.dir.clone()
        } else {
            parms.dir.join(format!("FILE_{done:06}"))
        };

        let slot = done as usize % buf_count;
        let buf = bufset.buffer(slot).expect("slot within buf_count");
        status |= write_file(&path, buf, parms, config, stats);
        done += 1;
    }

    status
}

fn write_file(
    path: &Path,
    buf: &mut [u8],
    parms: &CreateParms,
    config: &RunConfig,
    stats: &Mutex<PerfStats>,
) -> u32 {
    let fd = if config.simulate {
        -1
    } else {
        let mut opts = libc::O_WRONLY | config.create_opts();
        if parms.single_file && config.rewrite {
            opts &= !libc::O_TRUNC;
        }
        let fd = unsafe {
            libc::open(
                path_cstr(path).as_ptr(),
                opts,
                0o666,
            )
        };
        if fd < 0 {
            eprintln!(
                "Unable to create output file {}: {}",
                path.display(),
                std::io::Error::last_os_error()
            );
            return error::OUTPUT_FILE_ERROR;
        }
        fd
    };

    let mut bsize = config.bsize;
    if bsize == 0 {
        bsize = pattern::choose_bsize(config.direct as u64, pattern::max_bsize());
    }

    let mut fsize = config.length;
    if fsize == 0 {
        fsize = pattern::choose_file_size(bsize);
    }

    pattern::file_header(buf, path, fsize);

    let mut total = config.data;
    if total == 0 {
        total = fsize;
    }

    stats.lock().unwrap().file_done();

    let mut len = 0u64;
    let mut offset = parms.offset;
    let mut status = 0u32;
    if fd >= 0 && offset != 0 {
        let _ = seek_to(fd, offset);
    }

    while len < total && status == 0 {
        pattern::block_header(buf, bsize, offset);

        let bytes = if config.random > 0 { config.random } else { bsize };
        let write_len = (bytes as usize).min(buf.len());
        {
            let mut s = stats.lock().unwrap();
            match timed_write(fd, &buf[..write_len], &mut s, &path.to_string_lossy(), config.rate)
            {
                Ok(()) => {}
                Err(e) => status |= e.bits(),
            }
        }
        len += write_len as u64;

        if config.random > 0 && config.rewrite {
            let num_blocks = (fsize / bsize).max(1);
            let block = pattern::choose_block(num_blocks);
            offset = parms.offset + block * bsize;
            if fd >= 0 {
                let _ = seek_to(fd, offset);
            }
        } else {
            offset += write_len as u64;
        }
    }

    if fd >= 0 {
        unsafe {
            libc::close(fd);
        }
    }

    status
}

fn path_cstr(path: &Path) -> std::ffi::CString {
    std::ffi::CString::new(path.as_os_str().as_encoded_bytes()).unwrap_or_default()
}
