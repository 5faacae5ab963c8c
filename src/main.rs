//! CLI entry point: parses arguments (or bootstraps "zombie" remote-control
//! mode from stdin), then dispatches to the create/copy/read driver.

use anyhow::{Context, Result};
use clap::Parser;
use loadgen::command::CommandChannel;
use loadgen::config::{cli::Cli, cli_convert, Mode};
use loadgen::{driver, error, signals};
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

const HERALD: &str = "Yes Master?";
const WILCO: &str = "Yes Master!";
const RIP: &str = "Yes Master.";
const ARGH: &str = "Arg Master.";

fn main() {
    let shutdown: &'static Arc<AtomicBool> = Box::leak(Box::new(Arc::new(AtomicBool::new(false))));
    signals::install(shutdown);

    let zombie = std::env::args().count() <= 1;

    let status = if zombie {
        run_zombie(shutdown)
    } else {
        run_direct(shutdown)
    };

    std::process::exit(if status == 0 { 0 } else { 1 });
}

/// Normal invocation: parse argv directly, run once, exit with the worker
/// exit-status bitmask (nonzero -> process exit code 1).
fn run_direct(shutdown: &'static Arc<AtomicBool>) -> u32 {
    let cli = Cli::parse();
    match dispatch(cli, shutdown, false) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            error::RESOURCE_ERROR
        }
    }
}

/// Zombie mode: print the herald, read one whitespace-separated argv line
/// from stdin, build the `Cli` from it, then run with the command channel
/// live (further stdin lines retarget the thread count or shut down).
fn run_zombie(shutdown: &'static Arc<AtomicBool>) -> u32 {
    println!("{HERALD}");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
        println!("{ARGH}");
        return error::TARGET_DIRECTORY;
    }

    let mut argv = vec!["loadgen".to_string()];
    argv.extend(line.split_whitespace().map(str::to_string));

    let cli = match Cli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            println!("{ARGH}");
            return error::TARGET_DIRECTORY;
        }
    };

    println!("{WILCO}");
    let _ = std::io::stdout().flush();

    let status = match dispatch(cli, shutdown, true) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            error::RESOURCE_ERROR
        }
    };

    println!("{}", if status == 0 { RIP } else { ARGH });
    status
}

fn dispatch(cli: Cli, shutdown: &'static Arc<AtomicBool>, zombie: bool) -> Result<u32> {
    let config = cli_convert::to_run_config(cli).context("building run configuration")?;
    let config = Arc::new(config);
    let mut commands = CommandChannel::new();
    let shutdown_flag = Arc::clone(shutdown);

    let status = match config.mode {
        Mode::Create => driver::create::run(config, shutdown_flag, &mut commands, zombie),
        Mode::Copy => driver::copy::run(config, shutdown_flag, &mut commands, zombie),
        Mode::Read => driver::verify::run(config, shutdown_flag, &mut commands, zombie),
    };

    Ok(status)
}
