//! Histogram bucket width selection.

use oa_common::{Error, Result};

/// Bucket width for a histogram spanning `[min, max]` with at most
/// `target_bucket_count` buckets.
///
/// A degenerate range (`min == max`) yields 1 so downstream bucketing never
/// divides by zero. The result is always at least 1.
pub fn select_interval(min: f64, max: f64, target_bucket_count: i64) -> Result<u64> {
    if target_bucket_count <= 0 {
        return Err(Error::InvalidBucketCount {
            count: target_bucket_count,
        });
    }
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(Error::InvalidRange { min, max });
    }
    if max == min {
        return Ok(1);
    }
    let width = ((max - min) / target_bucket_count as f64).ceil();
    Ok((width as u64).max(1))
}

/// Number of buckets `interval` produces over `[min, max]`.
pub fn bucket_count(min: f64, max: f64, interval: u64) -> u64 {
    if interval == 0 || max <= min {
        return 1;
    }
    ((max - min) / interval as f64).ceil() as u64
}
