#![allow(dead_code)] // Public API surface is intentionally broader than internal use.
//! Parallel chunked aggregation over large delimited text files.
//!
//! ## Scope
//! This crate computes per-key summary statistics (minimum, mean, maximum)
//! over a `key;value` text file too large for naive line-by-line I/O. The
//! input is memory-mapped once, split into line-aligned chunks, aggregated by
//! a pool of workers into private tables, and merged into one sorted summary.
//!
//! ## Key invariants
//! - Chunks cover the input exactly once and never split a record; bounds
//!   are validated at chunk construction, not per byte.
//! - Each worker's table is exclusively owned for its whole lifetime: the
//!   hot aggregation loop takes no lock and touches no atomic.
//! - The merge is associative and commutative, so chunk boundaries and
//!   worker count never change the result beyond float summation order.
//! - Malformed input is fatal by default; the skip policy is an explicit
//!   opt-in and every dropped record is counted.
//!
//! ## Engine flow (single run)
//! `Path -> BytesView (mmap) -> ChunkSplitter -> bounded queue -> workers ->
//! join -> merge_tables -> format_table`
//!
//! ## Notable entry points
//! - [`summarize_path`] / [`aggregate_bytes`]: whole-run orchestration.
//! - [`ChunkSplitter`] / [`run_splitter`]: line-aligned chunk production.
//! - [`parse_record`]: one line into `(key, value)`.
//! - [`Aggregate`] / [`merge_tables`]: the fold and its reduction.
//! - [`format_table`]: the bit-exact output serialization.

pub mod bytes;
pub mod chunking;
pub mod errors;
pub mod format;
pub mod parse;
pub mod pipeline;
pub mod table;
pub mod worker;

pub use bytes::BytesView;
pub use chunking::{run_splitter, Chunk, ChunkSplitter, SplitParams, SplitterStats, TERMINATOR};
pub use errors::{AggregateError, OpenError, RecordError, RunError};
pub use format::format_table;
pub use parse::{parse_record, parse_value, DELIMITER};
pub use pipeline::{aggregate_bytes, summarize_path, Config, Report, Summary};
pub use table::{fold_observation, merge_tables, Aggregate, GlobalTable, PartialTable};
pub use worker::{aggregate_chunk, drain_chunks, MalformedPolicy, WorkerStats};
