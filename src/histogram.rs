use tracing::debug;

use crate::config::{DISTRIBUTION_BUCKETS, MAX_GRADE, MIN_GRADE};

/// Buckets raw grades into `DISTRIBUTION_BUCKETS` equal-width bins over the
/// closed range `[MIN_GRADE, MAX_GRADE]`. Index 0 holds the lowest grades;
/// values outside the range are skipped.
pub fn build_histogram(grades: &[f64]) -> Vec<u64> {
    build_histogram_with(grades, DISTRIBUTION_BUCKETS, MIN_GRADE, MAX_GRADE)
}

pub fn build_histogram_with(grades: &[f64], buckets: usize, low: f64, high: f64) -> Vec<u64> {
    let mut counts = vec![0u64; buckets];
    if buckets == 0 {
        return counts;
    }
    let width = (high - low) / buckets as f64;

    for &grade in grades {
        match bucket_index(grade, low, high, width, buckets) {
            Some(bucket) => counts[bucket - 1] += 1,
            None => debug!(grade, "grade outside distribution range skipped"),
        }
    }

    counts
}

/// 1-based bucket, with the upper bound folded into the last bucket.
fn bucket_index(grade: f64, low: f64, high: f64, width: f64, buckets: usize) -> Option<usize> {
    if !grade.is_finite() || grade < low || grade > high {
        return None;
    }
    let bucket = ((grade - low) / width).floor() as usize + 1;
    Some(bucket.min(buckets))
}
