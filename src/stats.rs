//! Selectivity estimation for the query planner.

use crate::datum::PredicateOp;

/// Equi-width histogram over a signed 32-bit integer domain.
///
/// Space and time are constant in the number of values histogrammed: only
/// per-bucket counts are kept. The effective bucket count is clamped to the
/// domain width so no bucket spans less than one value.
#[derive(Debug)]
pub struct IntHistogram {
    min: i32,
    max: i32,
    counts: Vec<u64>,
    total: u64,
}

impl IntHistogram {
    /// Creates a histogram with up to `bucket_count` buckets over
    /// `[min, max]`.
    ///
    /// # Panics
    ///
    /// Panics if `max <= min`.
    pub fn new(bucket_count: usize, min: i32, max: i32) -> Self {
        assert!(max > min, "histogram domain must span at least two values");
        let domain = (max as i64 - min as i64 + 1) as usize;
        let buckets = bucket_count.min(domain).max(1);
        Self {
            min,
            max,
            counts: vec![0; buckets],
            total: 0,
        }
    }

    /// Records one occurrence of `v`.
    ///
    /// Values outside `[min, max]` are a caller error and are ignored, so
    /// `sum(counts) == total` always holds.
    pub fn add_value(&mut self, v: i32) {
        if v < self.min || v > self.max {
            return;
        }
        let bucket = self.bucket_of(v);
        self.counts[bucket] += 1;
        self.total += 1;
    }

    /// Returns the number of recorded values.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the per-bucket counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Width of the value domain, inclusive.
    fn domain(&self) -> i64 {
        self.max as i64 - self.min as i64 + 1
    }

    /// Bucket index of an in-range value.
    fn bucket_of(&self, v: i32) -> usize {
        let buckets = self.counts.len() as i128;
        let offset = (v as i64 - self.min as i64) as i128;
        (buckets * offset / self.domain() as i128) as usize
    }

    /// Half-open value range `[imin, imax)` covered by bucket `i`.
    fn bucket_bounds(&self, i: usize) -> (i64, i64) {
        let buckets = self.counts.len() as i128;
        let min = self.min as i128;
        let domain = self.domain() as i128;
        let imin = min + (i as i128) * domain / buckets;
        let imax = min + (i as i128 + 1) * domain / buckets;
        (imin as i64, imax as i64)
    }

    /// Estimates the fraction of recorded values satisfying `op v`.
    ///
    /// Within a bucket the values are assumed uniformly distributed, so the
    /// bucket containing `v` contributes the matching fraction of its count
    /// and whole buckets on the matching side contribute fully. Out-of-range
    /// operands short-circuit to 0 or 1. The result is always in `[0, 1]`
    /// and monotone in `v` for the ordering operators.
    pub fn estimate_selectivity(&self, op: PredicateOp, v: i32) -> f64 {
        use PredicateOp::*;

        if v < self.min {
            return if matches!(op, GreaterThan | GreaterThanOrEq | NotEquals) {
                1.0
            } else {
                0.0
            };
        }
        if v > self.max {
            return if matches!(op, LessThan | LessThanOrEq | NotEquals) {
                1.0
            } else {
                0.0
            };
        }
        if self.total == 0 {
            return 0.0;
        }

        let i = self.bucket_of(v);
        let (imin, imax) = self.bucket_bounds(i);
        let width = (imax - imin) as f64;
        let count = self.counts[i] as f64;
        let total = self.total as f64;
        let v = v as i64;

        let higher = || self.counts[i + 1..].iter().sum::<u64>() as f64;
        let lower = || self.counts[..i].iter().sum::<u64>() as f64;

        let selectivity = match op {
            // LIKE over an integer domain degrades to equality.
            Equals | Like => count / (total * width),
            NotEquals => 1.0 - count / (total * width),
            GreaterThan => (count * (imax - v - 1) as f64 / width + higher()) / total,
            GreaterThanOrEq => (count * (imax - v) as f64 / width + higher()) / total,
            LessThan => (count * (v - imin) as f64 / width + lower()) / total,
            LessThanOrEq => (count * (v - imin + 1) as f64 / width + lower()) / total,
        };
        selectivity.clamp(0.0, 1.0)
    }
}
