//! Chunk workers: parse and fold into worker-private tables.
//!
//! Each worker pulls chunks from the bounded queue until the splitter drops
//! its sender, walks each chunk splitting on the terminator byte, parses
//! every record, and folds it into its own [`PartialTable`]. One worker never
//! touches another worker's table, so the hot aggregation loop runs without
//! any lock or atomic.
//!
//! A fatal malformed record makes the worker return immediately; dropping its
//! receiver is what eventually disconnects the splitter once every worker has
//! stopped (see `chunking::run_splitter`).

use crossbeam_channel::Receiver;
use memchr::memchr_iter;

use crate::chunking::{Chunk, TERMINATOR};
use crate::errors::AggregateError;
use crate::parse::parse_record;
use crate::table::{fold_observation, PartialTable};

/// Policy for records that fail to parse.
///
/// The default is fatal: a single corrupt record makes aggregate statistics
/// untrustworthy, so the whole run fails. `Skip` is an explicit opt-in that
/// drops the record and counts it in [`WorkerStats::records_skipped`];
/// dropped records are always reported, never silent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Abort the run on the first malformed record.
    #[default]
    Fatal,
    /// Drop malformed records and count them.
    Skip,
}

/// Per-worker counters, summed into the run report after the join.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Chunks fully aggregated by this worker.
    pub chunks: u64,
    /// Records folded into the table.
    pub records: u64,
    /// Malformed records dropped under [`MalformedPolicy::Skip`].
    pub records_skipped: u64,
}

/// Worker loop: drain the queue until it is exhausted.
///
/// `data` is the whole mapped input; each received [`Chunk`] selects the
/// byte range this call may read. Returns the private table and counters on
/// success, or the first fatal error.
pub fn drain_chunks(
    data: &[u8],
    rx: Receiver<Chunk>,
    policy: MalformedPolicy,
) -> Result<(PartialTable, WorkerStats), AggregateError> {
    let mut table = PartialTable::default();
    let mut stats = WorkerStats::default();

    while let Ok(chunk) = rx.recv() {
        aggregate_chunk(data, chunk, policy, &mut table, &mut stats)?;
        stats.chunks += 1;
    }

    Ok((table, stats))
}

/// Aggregates every record of one chunk into `table`.
///
/// The chunk is line-aligned by construction; only its last line may lack a
/// trailing terminator (end of input), and it is folded all the same.
pub fn aggregate_chunk(
    data: &[u8],
    chunk: Chunk,
    policy: MalformedPolicy,
    table: &mut PartialTable,
    stats: &mut WorkerStats,
) -> Result<(), AggregateError> {
    let bytes = chunk.slice(data);
    debug_assert!(!bytes.is_empty());

    let mut line_start = 0usize;
    for nl in memchr_iter(TERMINATOR, bytes) {
        fold_line(&bytes[line_start..nl], chunk, line_start, policy, table, stats)?;
        line_start = nl + 1;
    }
    if line_start < bytes.len() {
        fold_line(&bytes[line_start..], chunk, line_start, policy, table, stats)?;
    }

    Ok(())
}

#[inline]
fn fold_line(
    line: &[u8],
    chunk: Chunk,
    line_start: usize,
    policy: MalformedPolicy,
    table: &mut PartialTable,
    stats: &mut WorkerStats,
) -> Result<(), AggregateError> {
    match parse_record(line) {
        Ok((key, value)) => {
            fold_observation(table, key, value);
            stats.records += 1;
            Ok(())
        }
        Err(reason) => match policy {
            MalformedPolicy::Fatal => Err(AggregateError::MalformedRecord {
                offset: chunk.start + line_start as u64,
                reason,
            }),
            MalformedPolicy::Skip => {
                stats.records_skipped += 1;
                Ok(())
            }
        },
    }
}
