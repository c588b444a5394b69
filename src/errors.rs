//! Error types for the aggregation stages.
//!
//! Errors are stage-specific to keep diagnostics precise: opening/mapping the
//! input is a different failure mode than scanning it. All enums are
//! `#[non_exhaustive]` to allow adding variants without breaking callers;
//! consumers should include a fallback match arm.
//!
//! Offsets in variants are absolute byte offsets into the input file, so a
//! reported record can be located with any byte-level tool.

use std::fmt;
use std::io;

/// Errors from opening and mapping the input file.
#[derive(Debug)]
#[non_exhaustive]
pub enum OpenError {
    /// I/O error opening, statting, or mapping the input.
    Io(io::Error),
    /// The path resolves to something other than a regular file.
    NotAFile,
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot open input: {err}"),
            Self::NotAFile => write!(f, "input path is not a regular file"),
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors from splitting and aggregating the mapped input.
#[derive(Debug)]
#[non_exhaustive]
pub enum AggregateError {
    /// A record does not match `key<delim>value`: the delimiter is missing or
    /// the value fails both the fixed-precision grammar and the general
    /// decimal fallback.
    MalformedRecord {
        /// Absolute byte offset of the record's first byte.
        offset: u64,
        /// Why the record was rejected.
        reason: RecordError,
    },
    /// A single line exceeds the chunk scan window even after growing it
    /// once. The record is never truncated; the run fails instead.
    OversizedLine {
        /// Absolute byte offset where the terminator search started.
        offset: u64,
        /// Bytes scanned without finding a terminator.
        scanned: u64,
    },
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRecord { offset, reason } => {
                write!(f, "malformed record at byte {offset}: {reason}")
            }
            Self::OversizedLine { offset, scanned } => {
                write!(
                    f,
                    "no line terminator within {scanned} bytes starting at byte {offset}"
                )
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Reason a single record was rejected by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    /// No delimiter byte in the line.
    MissingDelimiter,
    /// The value after the delimiter is not a decimal number.
    BadValue,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDelimiter => write!(f, "missing ';' delimiter"),
            Self::BadValue => write!(f, "value is not a decimal number"),
        }
    }
}

impl std::error::Error for RecordError {}

/// Top-level error for a whole run: open/map or aggregate.
#[derive(Debug)]
#[non_exhaustive]
pub enum RunError {
    /// The input could not be opened or mapped.
    Open(OpenError),
    /// The input could not be aggregated.
    Aggregate(AggregateError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(err) => err.fmt(f),
            Self::Aggregate(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open(err) => Some(err),
            Self::Aggregate(err) => Some(err),
        }
    }
}

impl From<OpenError> for RunError {
    fn from(err: OpenError) -> Self {
        Self::Open(err)
    }
}

impl From<AggregateError> for RunError {
    fn from(err: AggregateError) -> Self {
        Self::Aggregate(err)
    }
}
