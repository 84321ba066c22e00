//! Spherical survey maps: a value channel and a weight channel on a
//! (radial, RA, Dec) grid.

use log::debug;
use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::coords::CoordinateAxes;
use crate::error::{PowerError, Result};
use crate::grid::{array_from_flat, checked_index, shape_of};

/// Per-map cell metadata.
///
/// `refine` is the number of coordinate-axis samples per map cell along
/// every axis: loop index `i` on a refined axis reads map cell `i / refine`.
/// The steps are map-cell widths; one refined sample spans `step / refine`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    /// Angular width of one map cell along RA, radians.
    pub ra_step: f64,
    /// Angular width of one map cell along Dec, radians.
    pub dec_step: f64,
    pub refine: usize,
}

impl MapInfo {
    /// Derive cell widths from the (unrefined) map axes.
    pub fn from_axes(axes: &CoordinateAxes, refine: usize) -> Self {
        Self {
            ra_step: axes.ra_step(),
            dec_step: axes.dec_step(),
            refine,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.refine == 0 {
            return Err(PowerError::geometry("map refinement factor must be at least 1"));
        }
        for (name, step) in [("RA", self.ra_step), ("Dec", self.dec_step)] {
            if !(step.is_finite() && step > 0.0) {
                return Err(PowerError::geometry(format!(
                    "map {name} cell width must be positive, got {step}"
                )));
            }
        }
        Ok(())
    }
}

/// Intensity map and its secondary channel, indexed `[radial, ra, dec]`.
#[derive(Debug, Clone)]
pub struct SurveyMap {
    values: Array3<f64>,
    weights: Array3<f64>,
    info: MapInfo,
}

impl SurveyMap {
    /// Create a map from two same-shaped channels.
    pub fn new(values: Array3<f64>, weights: Array3<f64>, info: MapInfo) -> Result<Self> {
        info.validate()?;
        if values.dim() != weights.dim() {
            return Err(PowerError::geometry(format!(
                "map channels differ in shape: {:?} vs {:?}",
                values.dim(),
                weights.dim()
            )));
        }
        Ok(Self {
            values,
            weights,
            info,
        })
    }

    /// Create a map from flat row-major buffers and their shape metadata.
    pub fn from_flat(
        values: Vec<f64>,
        weights: Vec<f64>,
        shape: [usize; 3],
        info: MapInfo,
    ) -> Result<Self> {
        Self::new(
            array_from_flat(values, shape)?,
            array_from_flat(weights, shape)?,
            info,
        )
    }

    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    pub fn shape(&self) -> [usize; 3] {
        shape_of(&self.values)
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    pub fn weights(&self) -> &Array3<f64> {
        &self.weights
    }

    /// Map cell read by loop indices (radial `i`, dec `j`, ra `k`).
    pub fn source_index(&self, i: usize, j: usize, k: usize) -> Result<[usize; 3]> {
        let refine = self.info.refine;
        checked_index(
            [(i / refine) as i64, (k / refine) as i64, (j / refine) as i64],
            self.shape(),
            "survey map",
        )
    }

    /// Both channels at a map cell.
    pub fn sample(&self, index: [usize; 3]) -> (f64, f64) {
        (self.values[index], self.weights[index])
    }

    /// Zero weights below `ratio` times the largest weight, returning how
    /// many samples were cleared.
    pub fn mask_low_weights(&mut self, ratio: f64) -> usize {
        let max = self
            .weights
            .iter()
            .copied()
            .filter(|w| !w.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return 0;
        }

        let threshold = ratio * max;
        let mut masked = 0;
        Zip::from(&mut self.weights).for_each(|w| {
            if *w < threshold && *w != 0.0 {
                *w = 0.0;
                masked += 1;
            }
        });
        debug!("Masked {masked} weights below {threshold:e}");
        masked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(refine: usize) -> MapInfo {
        MapInfo {
            ra_step: 0.1,
            dec_step: 0.1,
            refine,
        }
    }

    #[test]
    fn test_from_flat_rejects_mismatch() {
        let err = SurveyMap::from_flat(vec![0.0; 8], vec![0.0; 6], [2, 2, 2], info(1)).unwrap_err();
        assert!(matches!(err, PowerError::InvalidGeometry(_)));
    }

    #[test]
    fn test_rejects_bad_info() {
        assert!(SurveyMap::from_flat(vec![0.0; 8], vec![0.0; 8], [2, 2, 2], info(0)).is_err());
        let mut bad = info(1);
        bad.dec_step = 0.0;
        assert!(SurveyMap::from_flat(vec![0.0; 8], vec![0.0; 8], [2, 2, 2], bad).is_err());
    }

    #[test]
    fn test_source_index_scales_by_refinement() {
        let map = SurveyMap::from_flat(vec![0.0; 12], vec![0.0; 12], [2, 3, 2], info(2)).unwrap();
        // radial 3 -> 1, dec 1 -> 0, ra 5 -> 2; map order is [radial, ra, dec]
        assert_eq!(map.source_index(3, 1, 5).unwrap(), [1, 2, 0]);
        assert!(map.source_index(4, 0, 0).is_err());
    }

    #[test]
    fn test_mask_low_weights() {
        let weights = vec![1.0, 0.5, 1e-7, 0.0, 2e-6, 1.0, 1.0, 1.0];
        let mut map = SurveyMap::from_flat(vec![0.0; 8], weights, [2, 2, 2], info(1)).unwrap();
        assert_eq!(map.mask_low_weights(1e-5), 2);
        assert_eq!(map.weights()[[0, 1, 0]], 0.0);
        assert_eq!(map.weights()[[0, 0, 1]], 0.5);
    }
}
