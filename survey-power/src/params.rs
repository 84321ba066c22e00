//! Tunable parameters for gridding and spectrum estimation.
//!
//! All parameter sets are plain serde structs with JSON persistence so a
//! pipeline run can be reproduced from the files it was configured with.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Penalty added to the value channel of every partially covered cell.
pub const PARTIAL_CELL_PENALTY: f64 = 1.0e19;

/// JSON persistence shared by the parameter structs.
pub trait JsonParams: Serialize + DeserializeOwned {
    /// Save to JSON file
    fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file
    fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Shape and margin of a box built around a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxParams {
    pub shape: [usize; 3],
    /// Extra cell width, as a fraction, so edge samples land strictly inside.
    pub padding: f64,
}

impl Default for BoxParams {
    fn default() -> Self {
        Self {
            shape: [64, 64, 64],
            padding: 0.01,
        }
    }
}

/// Which completeness value scales the partial-cell penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialPenalty {
    /// `(1 - c[1]) * 1e19` for every partial cell: the completeness of flat
    /// cell 1, whatever cell is being penalised. Reproduces historical boxes.
    Legacy,
    /// `(1 - c) * 1e19` using the cell's own completeness.
    PerCell,
}

/// Options for the completeness-normalised fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillParams {
    pub penalty: PartialPenalty,
}

impl Default for FillParams {
    fn default() -> Self {
        Self {
            penalty: PartialPenalty::PerCell,
        }
    }
}

/// Half of Fourier space that feeds the (parallel, perpendicular) spectrum.
///
/// The power of a real field is symmetric under k -> -k, so only one half
/// is binned to avoid counting each mode pair twice.
///
/// The `SpectrumParams` default, `NonNegativeParallel`, reproduces the
/// historical binning kernel. Select `NonNegativeZ` to bin the `z < Nz/2`
/// half as the written binning description states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfSpace {
    /// Modes with non-negative x (parallel) frequency.
    NonNegativeParallel,
    /// Modes with non-negative z frequency.
    NonNegativeZ,
}

/// What happens to a mode whose wavenumber falls outside the bin range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Fail with `BinOutOfRange`.
    Strict,
    /// Drop the mode and count it in the result.
    Discard,
}

/// Bin counts and binning policy for `make_pk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumParams {
    /// Isotropic bins (N).
    pub bins: usize,
    /// Parallel bins (Np).
    pub parallel_bins: usize,
    /// Perpendicular bins (Nv).
    pub perpendicular_bins: usize,
    pub half_space: HalfSpace,
    pub range_policy: RangePolicy,
}

impl SpectrumParams {
    /// Strict parameters with the given bin counts.
    pub fn new(bins: usize, parallel_bins: usize, perpendicular_bins: usize) -> Self {
        Self {
            bins,
            parallel_bins,
            perpendicular_bins,
            ..Self::default()
        }
    }
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            bins: 20,
            parallel_bins: 10,
            perpendicular_bins: 10,
            half_space: HalfSpace::NonNegativeParallel,
            range_policy: RangePolicy::Strict,
        }
    }
}

impl JsonParams for BoxParams {}
impl JsonParams for FillParams {}
impl JsonParams for SpectrumParams {}
