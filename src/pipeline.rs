//! Run orchestration: map, split, aggregate in parallel, merge, format.
//!
//! # Architecture
//!
//! ```text
//! file ──mmap──> BytesView
//!                   │
//!            ┌──────┴───────┐
//!            │ splitter     │  one thread, sole cursor owner
//!            └──────┬───────┘
//!                   │ bounded channel (backpressure = queue_cap)
//!         ┌─────────┼─────────┐
//!         ▼         ▼         ▼
//!     worker 0  worker 1 … worker N-1   private PartialTables, no locks
//!         └─────────┼─────────┘
//!                   │ join barrier (thread::scope)
//!                   ▼
//!             merge_tables ──> format_table ──> stdout
//! ```
//!
//! # Correctness Invariants
//!
//! - **Exact cover**: chunks cover `[leading_skip, len)` exactly once; no
//!   record is split or read twice.
//! - **Exclusive tables**: each worker owns its table for its whole life;
//!   the only shared mutable state is the channel's interior.
//! - **Fail as a unit**: any worker or splitter error fails the run; a
//!   worker panic is resumed at the join. No partial output.
//! - **Merge after barrier**: the merge and the formatter only see tables of
//!   workers that have fully drained the queue.

use std::path::Path;
use std::thread;

use crossbeam_channel::bounded;

use crate::bytes::BytesView;
use crate::chunking::{run_splitter, SplitParams};
use crate::errors::{AggregateError, RunError};
use crate::format::format_table;
use crate::table::{merge_tables, GlobalTable};
use crate::worker::{drain_chunks, MalformedPolicy};

/// Configuration for one aggregation run.
///
/// # Defaults
///
/// | Parameter | Default | Rationale |
/// |-----------|---------|-----------|
/// | `workers` | CPU count | match hardware parallelism |
/// | `target_chunk_size` | 1 MiB | amortize queue traffic without starving workers |
/// | `queue_cap` | 4 × workers | splitter stays ahead, memory stays bounded |
/// | `leading_skip` | 0 | no encoding marker |
/// | `malformed` | `Fatal` | corrupt input never yields silent partial stats |
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of worker threads.
    pub workers: usize,
    /// Candidate window size for the splitter, in bytes.
    pub target_chunk_size: u32,
    /// Bound of the splitter→worker queue, in chunks.
    pub queue_cap: usize,
    /// Leading bytes to skip before the first record (e.g. an encoding
    /// marker). A fixed constant supplied by the caller, never auto-detected.
    pub leading_skip: u64,
    /// What to do with records that fail to parse.
    pub malformed: MalformedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let workers = num_cpus::get().max(1);
        Self {
            workers,
            target_chunk_size: 1024 * 1024,
            queue_cap: workers * 4,
            leading_skip: 0,
            malformed: MalformedPolicy::Fatal,
        }
    }
}

impl Config {
    /// Validate configuration.
    ///
    /// # Panics
    /// Panics on a zero worker count or queue bound, or an invalid
    /// `target_chunk_size`.
    pub fn validate(&self) {
        assert!(self.workers > 0, "workers must be >= 1");
        assert!(self.queue_cap > 0, "queue_cap must be >= 1");
        SplitParams::new(self.target_chunk_size, self.leading_skip);
    }
}

/// Counters for a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// Chunks produced by the splitter.
    pub chunks: u64,
    /// Bytes covered by produced chunks.
    pub bytes: u64,
    /// Records aggregated.
    pub records: u64,
    /// Distinct keys in the merged table.
    pub keys: u64,
    /// Malformed records dropped under the skip policy.
    pub records_skipped: u64,
    /// Worker count the run used.
    pub workers: usize,
}

/// A formatted summary plus its run counters.
#[derive(Clone, Debug)]
pub struct Summary {
    /// The serialized table: `{key=min/mean/max, ...}\n`.
    pub output: String,
    /// Run counters.
    pub report: Report,
}

/// Maps `path` and aggregates it, returning the formatted summary.
pub fn summarize_path(path: &Path, config: &Config) -> Result<Summary, RunError> {
    let bytes = BytesView::map_path(path)?;
    let (table, report) = aggregate_bytes(bytes.as_slice(), config)?;
    Ok(Summary {
        output: format_table(&table),
        report,
    })
}

/// Aggregates an in-memory or mapped byte range.
///
/// Spawns the splitter and `config.workers` workers under a scope that
/// borrows `data` read-only; the scope exit is the join barrier. Worker
/// errors surface here as `Err`; worker panics are resumed.
pub fn aggregate_bytes(
    data: &[u8],
    config: &Config,
) -> Result<(GlobalTable, Report), AggregateError> {
    config.validate();

    let params = SplitParams::new(config.target_chunk_size, config.leading_skip);
    let policy = config.malformed;
    let (tx, rx) = bounded(config.queue_cap);

    let (split_result, worker_results) = thread::scope(|s| {
        let splitter = s.spawn(move || run_splitter(data, params, tx));

        let workers: Vec<_> = (0..config.workers)
            .map(|_| {
                let rx = rx.clone();
                s.spawn(move || drain_chunks(data, rx, policy))
            })
            .collect();
        drop(rx);

        let worker_results: Vec<_> = workers
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect();
        let split_result = splitter
            .join()
            .unwrap_or_else(|e| std::panic::resume_unwind(e));

        (split_result, worker_results)
    });

    let mut report = Report {
        workers: config.workers,
        ..Report::default()
    };
    let mut first_err: Option<AggregateError> = None;
    let mut tables = Vec::with_capacity(worker_results.len());

    for result in worker_results {
        match result {
            Ok((table, stats)) => {
                report.records += stats.records;
                report.records_skipped += stats.records_skipped;
                tables.push(table);
            }
            Err(err) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }

    match split_result {
        Ok(stats) => {
            report.chunks = stats.chunks;
            report.bytes = stats.bytes;
        }
        Err(err) => {
            if first_err.is_none() {
                first_err = Some(err);
            }
        }
    }

    if let Some(err) = first_err {
        return Err(err);
    }

    let global = merge_tables(tables);
    report.keys = global.len() as u64;

    Ok((global, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RecordError;

    fn config(workers: usize, target_chunk_size: u32) -> Config {
        Config {
            workers,
            target_chunk_size,
            queue_cap: 8,
            leading_skip: 0,
            malformed: MalformedPolicy::Fatal,
        }
    }

    #[test]
    fn aggregates_reference_input() {
        let data = b"Hamburg;12.0\nHamburg;14.0\nBerlin;5.5\n";
        let (table, report) = aggregate_bytes(data, &config(2, 16)).unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.keys, 2);
        assert_eq!(report.bytes, data.len() as u64);
        assert_eq!(table.get(&b"Hamburg"[..]).unwrap().count, 2);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let (table, report) = aggregate_bytes(b"", &config(4, 1024)).unwrap();
        assert!(table.is_empty());
        assert_eq!(report.chunks, 0);
        assert_eq!(report.records, 0);
    }

    #[test]
    fn worker_counts_agree() {
        let mut data = Vec::new();
        for i in 0..500 {
            data.extend_from_slice(format!("key{};{}.{}\n", i % 7, i % 90, i % 10).as_bytes());
        }

        let (base, _) = aggregate_bytes(&data, &config(1, 64)).unwrap();
        for workers in [2, 4, 8] {
            let (table, _) = aggregate_bytes(&data, &config(workers, 64)).unwrap();
            assert_eq!(table.len(), base.len());
            for (key, agg) in &base {
                let other = table.get(key).unwrap();
                assert_eq!(agg.min, other.min, "min for {key:?}");
                assert_eq!(agg.max, other.max, "max for {key:?}");
                assert_eq!(agg.count, other.count, "count for {key:?}");
                assert!((agg.sum - other.sum).abs() < 1e-6, "sum for {key:?}");
            }
        }
    }

    #[test]
    fn malformed_record_fails_the_run() {
        let data = b"Berlin;5.5\nbogus line\nOslo;1.0\n";
        let err = aggregate_bytes(data, &config(2, 16)).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::MalformedRecord {
                reason: RecordError::MissingDelimiter,
                ..
            }
        ));
    }

    #[test]
    fn skip_policy_counts_dropped_records() {
        let data = b"Berlin;5.5\nbogus line\nOslo;1.0\n";
        let mut cfg = config(2, 16);
        cfg.malformed = MalformedPolicy::Skip;

        let (table, report) = aggregate_bytes(data, &cfg).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.records_skipped, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn oversized_line_fails_the_run() {
        let mut data = vec![b'x'; 4096];
        data.push(b'\n');
        data.extend_from_slice(b"Berlin;5.5\n");

        let err = aggregate_bytes(&data, &config(2, 64)).unwrap_err();
        assert!(matches!(err, AggregateError::OversizedLine { .. }));
    }

    #[test]
    fn leading_skip_drops_marker_bytes() {
        let data = b"\xef\xbb\xbfBerlin;5.5\n";
        let mut cfg = config(1, 1024);
        cfg.leading_skip = 3;

        let (table, report) = aggregate_bytes(data, &cfg).unwrap();
        assert_eq!(report.records, 1);
        assert!(table.contains_key(&b"Berlin"[..]));
    }

    #[test]
    fn more_workers_than_chunks_is_fine() {
        let data = b"Berlin;5.5\n";
        let (table, report) = aggregate_bytes(data, &config(8, 1024)).unwrap();
        assert_eq!(report.chunks, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    #[should_panic(expected = "workers must be >= 1")]
    fn zero_workers_panics() {
        let cfg = Config {
            workers: 0,
            ..Config::default()
        };
        let _ = aggregate_bytes(b"", &cfg);
    }
}
