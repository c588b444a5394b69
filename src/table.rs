//! Per-key aggregates and table merging.
//!
//! Each worker folds records into its own [`PartialTable`]; no table is ever
//! visible to two threads. After the join barrier the partial tables are
//! union-merged into one [`GlobalTable`]. The merge is associative and
//! commutative (min/max by comparison, sum/count by addition), so the
//! partition of records into chunks and workers never changes the result
//! beyond floating-point summation order.
//!
//! Keys are raw bytes; equality, hashing, and the final ordering are all
//! byte-wise. A key is materialized (allocated) once per distinct key per
//! worker, on first insertion; lookups borrow the line's key slice.

use ahash::AHashMap;

/// Accumulator of (min, max, sum, count) for one key.
///
/// `count == 0` is not constructible: an `Aggregate` exists only after its
/// first observation, so `min <= max` always holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aggregate {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl Aggregate {
    /// Aggregate of a single observation.
    #[inline]
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    /// Folds one observation in.
    #[inline]
    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Combines a disjoint aggregate of the same key into this one.
    #[inline]
    pub fn merge(&mut self, other: &Aggregate) {
        debug_assert!(other.count > 0, "merging uninitialized aggregate");
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean, derived at read time to avoid compounding rounding across
    /// merges.
    #[inline]
    pub fn mean(&self) -> f64 {
        debug_assert!(self.count > 0);
        self.sum / self.count as f64
    }
}

/// Worker-private mapping from key bytes to its aggregate.
pub type PartialTable = AHashMap<Box<[u8]>, Aggregate>;

/// The merged, final mapping from key bytes to its aggregate.
pub type GlobalTable = AHashMap<Box<[u8]>, Aggregate>;

/// Folds one observation of `key` into `table`.
///
/// The key is copied into the table only on first occurrence.
#[inline]
pub fn fold_observation(table: &mut PartialTable, key: &[u8], value: f64) {
    match table.get_mut(key) {
        Some(agg) => agg.observe(value),
        None => {
            table.insert(Box::from(key), Aggregate::new(value));
        }
    }
}

/// Union-merges worker tables into one global table.
///
/// Order-independent up to floating-point summation order. Runs single
/// threaded after the join barrier; the number of distinct keys is small
/// relative to the record count, so this is never the bottleneck.
pub fn merge_tables(partials: Vec<PartialTable>) -> GlobalTable {
    let mut partials = partials.into_iter();
    let mut global = partials.next().unwrap_or_default();

    for partial in partials {
        for (key, agg) in partial {
            debug_assert!(agg.count > 0);
            match global.get_mut(key.as_ref()) {
                Some(existing) => existing.merge(&agg),
                None => {
                    global.insert(key, agg);
                }
            }
        }
    }

    global
}
