//! `Cli` -> `RunConfig` conversion: size-suffix resolution, target lexing,
//! and mode inference.

use crate::config::{cli::Cli, DebugOpts, Mode, RunConfig, Target};
use crate::util::sizespec::{parse_size_spec, split_path_offset};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Convert a parsed `Cli` into an immutable `RunConfig`, resolving size
/// suffixes, `PATH:OFFSET` targets, and the tag default (local hostname,
/// matching the original's `uname().nodename` fallback).
pub fn to_run_config(cli: Cli) -> Result<RunConfig> {
    if cli.target.is_empty() {
        bail!("No target specified");
    }

    let targets = cli
        .target
        .iter()
        .map(|t| {
            let (path, offset) = split_path_offset(t);
            Target { path: PathBuf::from(path), offset }
        })
        .collect();

    let mode = if cli.read || cli.verify {
        Mode::Read
    } else if cli.source.is_some() {
        Mode::Copy
    } else {
        Mode::Create
    };

    let tag = cli.tag.unwrap_or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "loadgen".to_string())
    });

    Ok(RunConfig {
        mode,
        tag,
        targets,
        source: cli.source.map(PathBuf::from),
        bsize: parse_size_spec(&cli.bsize),
        length: parse_size_spec(&cli.length),
        data: parse_size_spec(&cli.data),
        maxfiles: cli.maxfiles,
        threads: cli.threads,
        update_secs: cli.update.max(1),
        rate: parse_size_spec(&cli.rate),
        direct: parse_size_spec(&cli.direct) as u32,
        depth: cli.depth.max(1),
        random: parse_size_spec(&cli.random),
        verify: cli.verify,
        rewrite: cli.rewrite,
        delete: cli.delete,
        sync: cli.sync,
        halt: cli.halt,
        simulate: cli.simulate,
        onceonly: cli.onceonly,
        debug: DebugOpts::parse(&cli.debug),
    })
    .context("building run configuration")
}
