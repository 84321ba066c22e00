//! Error types shared by the gridder and the power-spectrum binner.
//!
//! Every condition here is detected before the first write into a
//! caller-owned output, so an `Err` always leaves outputs untouched.

use thiserror::Error;

/// Errors that can occur while gridding a survey or binning a spectrum.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerError {
    /// Geometry or shape metadata is inconsistent with the supplied arrays.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A computed 3D index falls outside its destination (or source) array.
    #[error("{what} index {index:?} is out of range for shape {shape:?}")]
    IndexOutOfRange {
        what: &'static str,
        index: [i64; 3],
        shape: [usize; 3],
    },

    /// A bin count of zero makes the logarithmic bin ratio undefined.
    #[error("{axis} bin count must be positive, got {count}")]
    DegenerateBin { axis: &'static str, count: usize },

    /// A wavenumber landed outside the logarithmic bin range.
    #[error("{axis} bin {index} is out of range for {bins} bins")]
    BinOutOfRange {
        axis: &'static str,
        index: i64,
        bins: usize,
    },

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PowerError>;

impl PowerError {
    pub(crate) fn geometry(msg: impl Into<String>) -> Self {
        PowerError::InvalidGeometry(msg.into())
    }
}
