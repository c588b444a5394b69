//! Per-key summary statistics CLI
//!
//! Aggregates a large `key;value` text file into one sorted summary line
//! using a memory-mapped, parallel chunked engine.
//!
//! # Output Format
//!
//! The summary is written to stdout as:
//! `{key1=min/mean/max, key2=min/mean/max, ...}` with keys in ascending byte
//! order and values rounded to one fractional digit.
//!
//! Statistics are written to stderr upon completion:
//! `chunks=N bytes=N records=N keys=N skipped=N elapsed_ms=N throughput_mib_s=N workers=N`
//!
//! # Exit Codes
//!
//! - `0`: Success
//! - `1`: Runtime error (unreadable input, malformed record, oversized line)
//! - `2`: Invalid arguments

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use rowstat_rs::{summarize_path, Config, MalformedPolicy};

fn print_usage(exe: &std::ffi::OsStr) {
    eprintln!(
        "usage: {} [OPTIONS] <path>

OPTIONS:
    --workers=<N>       Number of worker threads (default: auto-detect CPU count)
    --chunk-size=<N>    Target chunk size in bytes (default: 1048576)
    --skip-malformed    Drop malformed records and count them instead of failing
    --help, -h          Show this help message",
        exe.to_string_lossy()
    );
}

fn main() {
    let mut args = env::args_os();
    let exe = args.next().unwrap_or_else(|| "rowstat".into());
    let mut path: Option<PathBuf> = None;
    let mut workers: Option<usize> = None;
    let mut chunk_size: Option<u32> = None;
    let mut skip_malformed = false;

    for arg in args {
        if let Some(flag) = arg.to_str() {
            if let Some(value) = flag.strip_prefix("--workers=") {
                let n: usize = value.parse().unwrap_or_else(|_| {
                    eprintln!("invalid --workers value: {}", value);
                    std::process::exit(2);
                });
                if n == 0 {
                    eprintln!("--workers must be >= 1");
                    std::process::exit(2);
                }
                workers = Some(n);
                continue;
            }
            if let Some(value) = flag.strip_prefix("--chunk-size=") {
                let n: u32 = value.parse().unwrap_or_else(|_| {
                    eprintln!("invalid --chunk-size value: {}", value);
                    std::process::exit(2);
                });
                if n == 0 {
                    eprintln!("--chunk-size must be >= 1");
                    std::process::exit(2);
                }
                chunk_size = Some(n);
                continue;
            }
            match flag {
                "--skip-malformed" => {
                    skip_malformed = true;
                    continue;
                }
                "--help" | "-h" => {
                    print_usage(&exe);
                    std::process::exit(0);
                }
                _ if flag.starts_with("--") => {
                    eprintln!("unknown flag: {}", flag);
                    print_usage(&exe);
                    std::process::exit(2);
                }
                _ => {}
            }
        }

        if path.is_some() {
            print_usage(&exe);
            std::process::exit(2);
        }
        path = Some(PathBuf::from(arg));
    }

    let Some(path) = path else {
        print_usage(&exe);
        std::process::exit(2);
    };

    let mut config = Config::default();
    if let Some(workers) = workers {
        config.workers = workers;
        config.queue_cap = workers * 4;
    }
    if let Some(chunk_size) = chunk_size {
        config.target_chunk_size = chunk_size;
    }
    if skip_malformed {
        config.malformed = MalformedPolicy::Skip;
    }

    let start = Instant::now();

    let summary = match summarize_path(&path, &config) {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("{}: {}", path.display(), err);
            std::process::exit(1);
        }
    };

    let mut stdout = io::stdout().lock();
    if stdout.write_all(summary.output.as_bytes()).is_err() {
        std::process::exit(1);
    }
    drop(stdout);

    let elapsed = start.elapsed();
    let elapsed_secs = elapsed.as_secs_f64();
    let throughput_mib = if elapsed_secs > 0.0 {
        (summary.report.bytes as f64 / (1024.0 * 1024.0)) / elapsed_secs
    } else {
        0.0
    };

    eprintln!(
        "chunks={} bytes={} records={} keys={} skipped={} elapsed_ms={} throughput_mib_s={:.2} workers={}",
        summary.report.chunks,
        summary.report.bytes,
        summary.report.records,
        summary.report.keys,
        summary.report.records_skipped,
        elapsed.as_millis(),
        throughput_mib,
        summary.report.workers
    );
}
