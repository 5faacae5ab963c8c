//! Command-line surface, mirroring the historical switch table one-for-one.

use clap::Parser;

/// Multi-threaded storage I/O load generator and verifier.
#[derive(Parser, Debug, Clone)]
#[command(name = "loadgen", version, about)]
pub struct Cli {
    /// Tag embedded in the run header and every report line.
    #[arg(short = 'T', long)]
    pub tag: Option<String>,

    /// Comma-separated write/read targets; a trailing `:OFFSET` is lexed off.
    #[arg(short = 'o', long, value_delimiter = ',')]
    pub target: Vec<String>,

    /// Source directory for copy/compare.
    #[arg(short = 'i', long)]
    pub source: Option<String>,

    /// Write/read block size (0 = random).
    #[arg(short = 'b', long, default_value = "0")]
    pub bsize: String,

    /// Per-file length (0 = random).
    #[arg(short = 'l', long, default_value = "0")]
    pub length: String,

    /// Total bytes to transfer per thread (0 = one file length).
    #[arg(short = 'Z', long, default_value = "0")]
    pub data: String,

    /// Cap on files created/read per worker (0 = unlimited).
    #[arg(short = 'M', long, default_value_t = 0)]
    pub maxfiles: u32,

    /// Initial worker thread target.
    #[arg(short = 't', long, default_value_t = 1)]
    pub threads: u32,

    /// Report/update interval in seconds.
    #[arg(short = 'u', long, default_value_t = 5)]
    pub update: u32,

    /// Target bandwidth in bytes/sec (0 = unlimited).
    #[arg(short = 'R', long, default_value = "0")]
    pub rate: String,

    /// Enable O_DIRECT at this alignment (0 = off).
    #[arg(short = 'A', long, default_value = "0")]
    pub direct: String,

    /// Buffer-set width (AIO depth).
    #[arg(short = 'a', long, default_value_t = 0)]
    pub depth: u32,

    /// Random-offset rewrite block size (0 = sequential).
    #[arg(short = 'z', long, default_value = "0")]
    pub random: String,

    /// Read mode.
    #[arg(short = 'r', long)]
    pub read: bool,

    /// Read mode plus content verification.
    #[arg(short = 'v', long)]
    pub verify: bool,

    /// Open existing files without truncation.
    #[arg(short = 'w', long)]
    pub rewrite: bool,

    /// Unlink files (and rmdir directories) after a successful verify.
    #[arg(short = 'd', long)]
    pub delete: bool,

    /// Open with O_DSYNC.
    #[arg(short = 's', long)]
    pub sync: bool,

    /// Stop on first worker error.
    #[arg(short = 'H', long)]
    pub halt: bool,

    /// Skip actual I/O but still account for it in the statistics.
    #[arg(short = 'S', long)]
    pub simulate: bool,

    /// Cap scanned subdirectories to the thread count.
    #[arg(short = '1', long)]
    pub onceonly: bool,

    /// Debug option letters (see `DebugOpts`).
    #[arg(short = 'D', long, default_value = "")]
    pub debug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_create_invocation() {
        let cli = Cli::parse_from(["loadgen", "--target", "/tmp/t", "--threads", "2"]);
        assert_eq!(cli.target, vec!["/tmp/t".to_string()]);
        assert_eq!(cli.threads, 2);
        assert!(!cli.read);
    }

    #[test]
    fn splits_comma_separated_targets() {
        let cli = Cli::parse_from(["loadgen", "--target", "/tmp/a,/tmp/b"]);
        assert_eq!(cli.target, vec!["/tmp/a".to_string(), "/tmp/b".to_string()]);
    }

    #[test]
    fn parses_short_flags() {
        let cli = Cli::parse_from(["loadgen", "-o", "/tmp/t", "-r", "-v"]);
        assert!(cli.read);
        assert!(cli.verify);
    }
}
