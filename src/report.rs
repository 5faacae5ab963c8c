//! Periodic throughput reporting: one `REPORT ...` line per update interval.

use crate::stats::PerfStats;
use chrono::{Datelike, Local, Timelike};

/// Print one `REPORT` line to stdout.
///
/// The byte/rate/histogram fields are only printed when there is something
/// to report (`stats.bytes > 0` or at least one thread is running), so a
/// quiescent interval still produces a line but a lean one.
pub fn report(tag: Option<&str>, threads: u32, microseconds: i64, stats: &PerfStats) {
    let now = Local::now();
    print!(
        "REPORT date={:02}/{:02}/{:04} time={:02}:{:02}:{:02} ",
        now.month(),
        now.day(),
        now.year(),
        now.hour(),
        now.minute(),
        now.second()
    );

    if let Some(tag) = tag {
        print!("tag={tag} ");
    }

    print!("threads={threads} ");

    if stats.bytes > 0 || threads > 0 {
        let secs = (microseconds + 500_000) / 1_000_000;
        let rate = if microseconds > 0 {
            (stats.bytes as i64 * 1_000_000) / microseconds
        } else {
            0
        };
        print!("bytes={} seconds={secs} rate={rate} ", stats.bytes);

        print!("us_buckets=");
        for (i, bucket) in stats.buckets.iter().enumerate() {
            if i == 0 {
                print!("{bucket}");
            } else {
                print!(",{bucket}");
            }
        }
    }

    println!();
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
