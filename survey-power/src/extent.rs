//! Value extent of a box channel.
//!
//! Used for the post-fill diagnostics: the first NaN is remembered so a
//! corrupted channel reports where it went bad instead of a bogus range.

use ndarray::Array3;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtentError {
    #[error("NaN value encountered at flat index {0}")]
    NaNEncountered(usize),
    #[error("Channel is empty")]
    NoData,
}

/// Minimum and maximum of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelExtent {
    range: Option<(f64, f64)>,
    nan_index: Option<usize>,
}

impl ChannelExtent {
    /// Scan values in iteration order.
    pub fn scan<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut range: Option<(f64, f64)> = None;
        let mut nan_index = None;

        for (index, value) in values.into_iter().enumerate() {
            if value.is_nan() {
                nan_index.get_or_insert(index);
                continue;
            }
            range = Some(match range {
                None => (value, value),
                Some((lo, hi)) => (lo.min(value), hi.max(value)),
            });
        }

        Self { range, nan_index }
    }

    /// Scan a box channel in row-major order.
    pub fn of(channel: &Array3<f64>) -> Self {
        Self::scan(channel.iter().copied())
    }

    /// `(min, max)`, or why there is none.
    pub fn min_max(&self) -> Result<(f64, f64), ExtentError> {
        if let Some(index) = self.nan_index {
            return Err(ExtentError::NaNEncountered(index));
        }
        self.range.ok_or(ExtentError::NoData)
    }

    pub fn has_nan(&self) -> bool {
        self.nan_index.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extent() {
        let extent = ChannelExtent::scan([3.0, -1.0, 4.0, 1.0, 5.0]);
        assert_eq!(extent.min_max(), Ok((-1.0, 5.0)));
        assert!(!extent.has_nan());
    }

    #[test]
    fn test_nan_reports_first_index() {
        let extent = ChannelExtent::scan([1.0, f64::NAN, 2.0, f64::NAN]);
        assert!(extent.has_nan());
        assert_eq!(extent.min_max(), Err(ExtentError::NaNEncountered(1)));
    }

    #[test]
    fn test_empty() {
        let extent = ChannelExtent::scan(std::iter::empty());
        assert_eq!(extent.min_max(), Err(ExtentError::NoData));
    }

    #[test]
    fn test_box_channel() {
        let mut channel = Array3::<f64>::zeros((2, 2, 2));
        channel[[1, 1, 0]] = 7.5;
        channel[[0, 1, 1]] = -2.0;
        assert_eq!(ChannelExtent::of(&channel).min_max(), Ok((-2.0, 7.5)));
    }
}
