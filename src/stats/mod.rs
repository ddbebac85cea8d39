//! Bandwidth estimation and the small statistics used to aggregate samples

use crate::error::{AppError, Result};

/// Bits in a megabit as used by the estimator (binary mega, 1024 * 1024)
pub const BITS_PER_MEGABIT: f64 = 1024.0 * 1024.0;

/// Converts transferred bytes over a time window into megabits per second
#[derive(Debug, Clone, Copy, Default)]
pub struct BandwidthEstimator;

impl BandwidthEstimator {
    /// `(bytes * 8) / (1024 * 1024) / seconds`.
    ///
    /// Fails with `InvalidDuration` when `seconds` is not strictly positive;
    /// callers hit this on the very first sample of a window and should defer
    /// the sample rather than report it.
    pub fn estimate(bytes: u64, seconds: f64) -> Result<f64> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(AppError::invalid_duration(format!(
                "cannot compute a rate over {} seconds",
                seconds
            )));
        }

        Ok((bytes as f64 * 8.0) / BITS_PER_MEGABIT / seconds)
    }
}

/// Element at index `floor(n / 2)` of the sorted input
pub fn midpoint(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[sorted.len() / 2])
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Largest value, `None` for an empty slice
pub fn peak(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_estimate_reference_values() {
        // 6_553_600 bytes in one second is exactly 50 Mbps
        assert_eq!(BandwidthEstimator::estimate(6_553_600, 1.0).unwrap(), 50.0);
        assert_eq!(BandwidthEstimator::estimate(1024 * 1024, 8.0).unwrap(), 1.0);
        assert_eq!(BandwidthEstimator::estimate(0, 3.5).unwrap(), 0.0);
    }

    #[test]
    fn test_estimate_rejects_zero_duration() {
        for bytes in [0u64, 1, 65_536, u64::MAX] {
            let error = BandwidthEstimator::estimate(bytes, 0.0).unwrap_err();
            assert!(matches!(error, AppError::InvalidDuration(_)));
        }
    }

    #[test]
    fn test_estimate_rejects_negative_and_nan() {
        assert!(BandwidthEstimator::estimate(10, -1.0).is_err());
        assert!(BandwidthEstimator::estimate(10, f64::NAN).is_err());
        assert!(BandwidthEstimator::estimate(10, f64::INFINITY).is_err());
    }

    proptest! {
        #[test]
        fn prop_estimate_matches_formula(bytes in 0u64..10_000_000_000, seconds in 0.000_001f64..10_000.0) {
            let expected = bytes as f64 * 8.0 / (1024.0 * 1024.0) / seconds;
            let first = BandwidthEstimator::estimate(bytes, seconds).unwrap();
            let second = BandwidthEstimator::estimate(bytes, seconds).unwrap();
            prop_assert_eq!(first, expected);
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(&[]), None);
        assert_eq!(midpoint(&[30.0, 10.0, 20.0]), Some(20.0));
        // Even length picks the upper of the two middle values by index n/2
        assert_eq!(midpoint(&[40.0, 10.0, 30.0, 20.0]), Some(30.0));
        assert_eq!(midpoint(&[7.0]), Some(7.0));
    }

    #[test]
    fn test_mean_and_peak() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[50.0, 70.0]), Some(60.0));
        assert_eq!(peak(&[]), None);
        assert_eq!(peak(&[12.5, 80.0, 33.0]), Some(80.0));
    }
}
