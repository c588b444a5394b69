//! Line-aligned chunk splitting.
//!
//! The splitter turns the mapped input into a sequence of [`Chunk`]
//! descriptors that cover `[start, capacity)` exactly once. Each chunk ends
//! immediately after a terminator byte, so no record is ever split across two
//! chunks; the only exception is the final chunk, which may end at
//! end-of-file without a trailing terminator.
//!
//! # Naming Convention
//!
//! - `start`: absolute offset of `chunk`'s first byte in the input
//! - `len`: total bytes in the chunk, including the trailing terminator
//! - `capacity`: total length of the mapped input
//!
//! # Window Growth
//!
//! A candidate window of `target_chunk_size` bytes is scanned backward for
//! the last terminator. A window with no terminator means a single line
//! longer than the target; the splitter grows the window once (to twice the
//! target, clamped to the remaining input) and rescans only the grown tail.
//! If the grown window still has no terminator and does not reach
//! end-of-file, the run fails with [`AggregateError::OversizedLine`] rather
//! than truncating the record.
//!
//! # Performance Notes
//!
//! The splitter is O(window) per chunk, dominated by the backward `memrchr`;
//! the aggregation loop downstream dominates the run. It is the sole owner of
//! its cursor and runs on one thread, so it needs no synchronization beyond
//! the hand-off channel.

use crossbeam_channel::Sender;
use memchr::memrchr;

use crate::errors::AggregateError;

/// Record terminator byte.
pub const TERMINATOR: u8 = b'\n';

/// A line-aligned byte range of the mapped input.
///
/// Bounds are validated once at construction against the input capacity;
/// downstream code indexes the backing slice without re-validating per byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Absolute offset of the chunk's first byte.
    pub start: u64,
    /// Chunk length in bytes, trailing terminator included.
    pub len: u32,
}

impl Chunk {
    /// Creates a chunk, asserting it lies within `capacity`.
    ///
    /// # Panics
    /// Panics if `len` is 0 or the range exceeds `capacity`.
    pub fn new(start: u64, len: u32, capacity: u64) -> Self {
        assert!(len > 0, "empty chunk");
        let end = start
            .checked_add(len as u64)
            .expect("chunk end overflows u64");
        assert!(end <= capacity, "chunk [{start}, {end}) exceeds capacity {capacity}");
        Self { start, len }
    }

    /// Exclusive end offset.
    #[inline]
    pub fn end(&self) -> u64 {
        self.start + self.len as u64
    }

    /// The chunk's bytes within the full input slice.
    #[inline]
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start as usize..self.end() as usize]
    }
}

/// Splitting parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitParams {
    /// Candidate window size per chunk. Emitted chunks are at most this long
    /// except when the one-shot window growth applies.
    pub target_chunk_size: u32,
    /// Offset of the first byte to split. Skips a fixed leading marker (for
    /// example an encoding BOM); supplied by the caller, never auto-detected.
    pub start: u64,
}

impl SplitParams {
    /// Create split params with validation.
    ///
    /// # Panics
    /// Panics if `target_chunk_size` is 0 or too large for one-shot growth.
    pub fn new(target_chunk_size: u32, start: u64) -> Self {
        let params = Self {
            target_chunk_size,
            start,
        };
        params.validate();
        params
    }

    /// Validate parameters.
    pub fn validate(&self) {
        assert!(self.target_chunk_size > 0, "target_chunk_size must be > 0");
        // The grown window is 2x the target and must still fit a chunk len.
        assert!(
            self.target_chunk_size <= u32::MAX / 2,
            "target_chunk_size must leave room for one-shot window growth"
        );
    }
}

/// Iterator over line-aligned chunks of `data`.
///
/// Yields `Err` at most once (an oversized line) and fuses afterwards.
pub struct ChunkSplitter<'a> {
    data: &'a [u8],
    target: u32,
    /// Cursor: next byte to cover. The splitter is the sole writer.
    offset: u64,
    failed: bool,
}

impl<'a> ChunkSplitter<'a> {
    /// Create a splitter over `data` with the given params.
    pub fn new(data: &'a [u8], params: SplitParams) -> Self {
        params.validate();
        Self {
            data,
            target: params.target_chunk_size,
            offset: params.start.min(data.len() as u64),
            failed: false,
        }
    }
}

impl Iterator for ChunkSplitter<'_> {
    type Item = Result<Chunk, AggregateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let capacity = self.data.len() as u64;
        let offset = self.offset;
        if offset >= capacity {
            return None;
        }

        let remaining = capacity - offset;
        let window = remaining.min(self.target as u64) as u32;
        debug_assert!(window > 0);

        let window_bytes = &self.data[offset as usize..(offset + window as u64) as usize];
        if let Some(p) = memrchr(TERMINATOR, window_bytes) {
            let len = (p + 1) as u32;
            self.offset = offset + len as u64;
            return Some(Ok(Chunk::new(offset, len, capacity)));
        }

        // No terminator in the window. If the window already reaches
        // end-of-file, the last line simply has no trailing terminator and
        // the final chunk covers it whole.
        if window as u64 == remaining {
            self.offset = capacity;
            return Some(Ok(Chunk::new(offset, window, capacity)));
        }

        // One-shot growth: double the window, clamped to the remaining
        // input, and rescan only the grown tail (the head was already
        // scanned above).
        let grown = remaining.min(2 * self.target as u64) as u32;
        debug_assert!(grown > window);
        let tail =
            &self.data[(offset + window as u64) as usize..(offset + grown as u64) as usize];
        if let Some(p) = memrchr(TERMINATOR, tail) {
            let len = window + (p + 1) as u32;
            self.offset = offset + len as u64;
            return Some(Ok(Chunk::new(offset, len, capacity)));
        }

        if grown as u64 == remaining {
            self.offset = capacity;
            return Some(Ok(Chunk::new(offset, grown, capacity)));
        }

        self.failed = true;
        Some(Err(AggregateError::OversizedLine {
            offset,
            scanned: grown as u64,
        }))
    }
}

/// Per-run splitter counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitterStats {
    /// Chunks published to the queue.
    pub chunks: u64,
    /// Bytes covered by published chunks.
    pub bytes: u64,
}

/// Splits `data` and publishes chunks into the bounded queue.
///
/// `send` blocks when the queue is full, which is the backpressure bound: the
/// splitter can be at most `queue_cap` chunks ahead of the slowest worker.
/// Dropping the sender on return is the terminal signal for workers. A `send`
/// failure means every worker has dropped its receiver (a worker hit a fatal
/// record); production stops quietly and the cause surfaces at the join.
pub fn run_splitter(
    data: &[u8],
    params: SplitParams,
    tx: Sender<Chunk>,
) -> Result<SplitterStats, AggregateError> {
    let mut stats = SplitterStats::default();

    for item in ChunkSplitter::new(data, params) {
        let chunk = item?;
        stats.chunks += 1;
        stats.bytes += chunk.len as u64;
        if tx.send(chunk).is_err() {
            break;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects chunks, asserting the splitter never fails.
    fn split_ok(data: &[u8], target: u32) -> Vec<Chunk> {
        ChunkSplitter::new(data, SplitParams::new(target, 0))
            .map(|c| c.unwrap())
            .collect()
    }

    /// Chunks must cover `[start, len)` exactly once, in order.
    fn assert_exact_cover(chunks: &[Chunk], start: u64, len: u64) {
        let mut cursor = start;
        for chunk in chunks {
            assert_eq!(chunk.start, cursor);
            cursor = chunk.end();
        }
        assert_eq!(cursor, len);
    }

    #[test]
    fn splits_on_terminators() {
        let data = b"Berlin;5.5\nHamburg;12.0\nOslo;-3.2\n";
        let chunks = split_ok(data, 16);

        assert_exact_cover(&chunks, 0, data.len() as u64);
        for chunk in &chunks {
            assert_eq!(*chunk.slice(data).last().unwrap(), TERMINATOR);
        }
    }

    #[test]
    fn single_chunk_when_window_covers_input() {
        let data = b"Berlin;5.5\nHamburg;12.0\n";
        let chunks = split_ok(data, 4096);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], Chunk { start: 0, len: data.len() as u32 });
    }

    #[test]
    fn final_chunk_without_trailing_terminator() {
        let data = b"Berlin;5.5\nHamburg;12.0";
        let chunks = split_ok(data, 16);

        assert_exact_cover(&chunks, 0, data.len() as u64);
        let last = chunks.last().unwrap();
        assert_eq!(last.slice(data), b"Hamburg;12.0");
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_ok(b"", 16).is_empty());
    }

    #[test]
    fn start_offset_skips_leading_marker() {
        // Three BOM bytes before the first record.
        let data = b"\xef\xbb\xbfBerlin;5.5\n";
        let chunks: Vec<Chunk> = ChunkSplitter::new(data, SplitParams::new(64, 3))
            .map(|c| c.unwrap())
            .collect();

        assert_exact_cover(&chunks, 3, data.len() as u64);
        assert_eq!(chunks[0].slice(data), b"Berlin;5.5\n");
    }

    #[test]
    fn start_past_capacity_yields_no_chunks() {
        let data = b"x\n";
        let chunks: Vec<_> = ChunkSplitter::new(data, SplitParams::new(16, 100)).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn grows_window_once_for_long_line() {
        // One 20-byte line; an 8-byte window has no terminator, the grown
        // 16-byte window still has none, but a 24-byte line with terminator
        // at 20 is found after growth when target is 12.
        let data = b"VeryLongCityName;1.0\nB;2.0\n";
        let chunks = split_ok(data, 12);

        assert_exact_cover(&chunks, 0, data.len() as u64);
        assert_eq!(chunks[0].slice(data), b"VeryLongCityName;1.0\n");
    }

    #[test]
    fn oversized_line_fails_after_growth() {
        // 40 bytes of line, terminator beyond the grown 2x8 = 16-byte window,
        // and more input after it so the end-of-file case does not apply.
        let mut data = vec![b'x'; 40];
        data.push(TERMINATOR);
        data.extend_from_slice(b"B;2.0\n");

        let mut splitter = ChunkSplitter::new(&data, SplitParams::new(8, 0));
        let err = splitter.next().unwrap().unwrap_err();
        match err {
            AggregateError::OversizedLine { offset, scanned } => {
                assert_eq!(offset, 0);
                assert_eq!(scanned, 16);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The splitter fuses after a failure.
        assert!(splitter.next().is_none());
    }

    #[test]
    fn unterminated_tail_longer_than_window_is_final_chunk() {
        // The grown window reaches end-of-file: keep the whole tail.
        let data = b"A;1.0\nxxxxxxxxxxxx";
        let chunks = split_ok(data, 8);

        assert_exact_cover(&chunks, 0, data.len() as u64);
        assert_eq!(chunks.last().unwrap().slice(data), b"xxxxxxxxxxxx");
    }

    #[test]
    fn every_boundary_is_after_terminator() {
        // Dense terminators, tiny window: all interior boundaries must land
        // right after a '\n'. Targets below 3 cannot fit a 6-byte line even
        // after growth and are covered by the oversized-line test instead.
        let data = b"a;1.0\nb;2.0\nc;3.0\nd;4.0\ne;5.0\n";
        for target in 3..=(data.len() as u32) {
            let chunks: Vec<_> = ChunkSplitter::new(data, SplitParams::new(target, 0))
                .map(|c| c.unwrap())
                .collect();
            assert_exact_cover(&chunks, 0, data.len() as u64);
            for chunk in &chunks {
                assert_eq!(data[chunk.end() as usize - 1], TERMINATOR);
            }
        }
    }

    #[test]
    #[should_panic(expected = "target_chunk_size must be > 0")]
    fn zero_target_panics() {
        SplitParams::new(0, 0);
    }

    #[test]
    #[should_panic(expected = "exceeds capacity")]
    fn chunk_bounds_are_checked_at_construction() {
        Chunk::new(10, 20, 16);
    }

    #[test]
    fn run_splitter_stops_when_receivers_drop() {
        let data = b"a;1.0\nb;2.0\nc;3.0\n";
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);

        let stats = run_splitter(data, SplitParams::new(6, 0), tx).unwrap();
        // First send fails; exactly one chunk was produced before stopping.
        assert_eq!(stats.chunks, 1);
    }

    #[test]
    fn run_splitter_reports_error() {
        let mut data = vec![b'x'; 64];
        data.push(TERMINATOR);
        data.extend_from_slice(b"B;2.0\n");
        let (tx, _rx) = crossbeam_channel::bounded(16);

        let err = run_splitter(&data, SplitParams::new(8, 0), tx).unwrap_err();
        assert!(matches!(err, AggregateError::OversizedLine { .. }));
    }
}
