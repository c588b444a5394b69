//! Final serialization of the merged table.
//!
//! Output contract: `{` followed by `", "`-joined entries sorted by key in
//! ascending byte order, each entry `key=min/mean/max` with every number
//! rendered to exactly one fractional digit, followed by `}` and a trailing
//! newline. Mean is computed here, at format time, in floating point.
//!
//! Rounding is half-away-from-zero: values are scaled by ten, rounded with
//! `f64::round` (which rounds halves away from zero), and scaled back before
//! `{:.1}` rendering. `2.25` renders as `2.3` and `-2.25` as `-2.3`.
//!
//! Formatting is pure: the same table always yields byte-identical output.

use std::fmt::Write as _;

use crate::table::GlobalTable;

/// Rounds to one fractional digit, halves away from zero.
#[inline]
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Renders the global table as the single-line summary.
pub fn format_table(table: &GlobalTable) -> String {
    let mut entries: Vec<_> = table.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    // Rough size: key + "=-xx.x/-xx.x/-xx.x, " per entry.
    let mut out = String::with_capacity(2 + entries.iter().map(|(k, _)| k.len() + 22).sum::<usize>());
    out.push('{');

    for (i, (key, agg)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        // Input is declared UTF-8; lossy conversion keeps the formatter
        // total for byte keys that violate that declaration.
        out.push_str(&String::from_utf8_lossy(key));
        let _ = write!(
            out,
            "={:.1}/{:.1}/{:.1}",
            round1(agg.min),
            round1(agg.mean()),
            round1(agg.max)
        );
    }

    out.push_str("}\n");
    out
}
