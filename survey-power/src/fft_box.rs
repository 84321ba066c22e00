//! Cartesian destination box for gridded survey data.
//!
//! The box is a cube lattice: one cell size shared by all three axes,
//! anchored at `origin`. Cell `[x, y, z]` covers
//! `origin + [x, y, z] * cell_size .. origin + [x + 1, y + 1, z + 1] * cell_size`.

use log::debug;
use nalgebra::Vector3;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::coords::CoordinateAxes;
use crate::error::{PowerError, Result};
use crate::grid::{array_from_flat, cell_count, shape_of};
use crate::params::BoxParams;

/// Origin and cube cell size of a box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    pub origin: [f64; 3],
    pub cell_size: f64,
}

impl BoxGeometry {
    pub fn new(origin: [f64; 3], cell_size: f64) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(PowerError::geometry(format!(
                "box cell size must be positive, got {cell_size}"
            )));
        }
        if origin.iter().any(|v| !v.is_finite()) {
            return Err(PowerError::geometry(format!(
                "box origin must be finite, got {origin:?}"
            )));
        }
        Ok(Self { origin, cell_size })
    }

    /// Volume of a single cell.
    pub fn cell_volume(&self) -> f64 {
        self.cell_size * self.cell_size * self.cell_size
    }

    /// Signed cell index containing a point (floor of the scaled offset).
    pub fn cell_of(&self, point: &Vector3<f64>) -> [i64; 3] {
        let mut index = [0i64; 3];
        for axis in 0..3 {
            index[axis] = ((point[axis] - self.origin[axis]) / self.cell_size).floor() as i64;
        }
        index
    }
}

/// Value and weight channels sharing one geometry.
#[derive(Debug, Clone)]
pub struct FftBox {
    values: Array3<f64>,
    weights: Array3<f64>,
    geometry: BoxGeometry,
}

impl FftBox {
    /// Zero-filled box.
    pub fn zeros(shape: [usize; 3], geometry: BoxGeometry) -> Result<Self> {
        if cell_count(shape) == 0 {
            return Err(PowerError::geometry(format!("box shape {shape:?} has no cells")));
        }
        let dim = (shape[0], shape[1], shape[2]);
        Ok(Self {
            values: Array3::zeros(dim),
            weights: Array3::zeros(dim),
            geometry,
        })
    }

    /// Box over caller-supplied initial values.
    pub fn from_flat(
        values: Vec<f64>,
        weights: Vec<f64>,
        shape: [usize; 3],
        geometry: BoxGeometry,
    ) -> Result<Self> {
        if cell_count(shape) == 0 {
            return Err(PowerError::geometry(format!("box shape {shape:?} has no cells")));
        }
        Ok(Self {
            values: array_from_flat(values, shape)?,
            weights: array_from_flat(weights, shape)?,
            geometry,
        })
    }

    /// Smallest centred cube lattice of `params.shape` cells enclosing every
    /// survey sample, widened by `params.padding` (a fraction of the cell).
    ///
    /// The cube cell is the largest per-axis `span / shape`, so the most
    /// extended axis sets the resolution and the others gain margin.
    ///
    /// # Arguments
    /// * `axes` - Survey sample positions (refined, if the fill will be)
    /// * `params` - Cell counts per axis and fractional padding
    ///
    /// # Returns
    /// A zero-filled box, or `InvalidGeometry` for an empty shape or a
    /// survey with no extent.
    pub fn enclosing(axes: &CoordinateAxes, params: &BoxParams) -> Result<Self> {
        let shape = params.shape;
        if cell_count(shape) == 0 {
            return Err(PowerError::geometry(format!("box shape {shape:?} has no cells")));
        }

        let mut lo = Vector3::repeat(f64::INFINITY);
        let mut hi = Vector3::repeat(f64::NEG_INFINITY);
        for p in axes.cartesian_points() {
            lo = lo.inf(&p);
            hi = hi.sup(&p);
        }

        let span = hi - lo;
        let mut cell_size = 0.0f64;
        for axis in 0..3 {
            cell_size = cell_size.max(span[axis] / shape[axis] as f64);
        }
        let cell_size = cell_size * (1.0 + params.padding);

        let centre = (lo + hi) * 0.5;
        let mut origin = [0.0; 3];
        for axis in 0..3 {
            origin[axis] = centre[axis] - 0.5 * shape[axis] as f64 * cell_size;
        }
        debug!(
            "Enclosing box: shape {:?}, cell size {:.4}, origin {:?}",
            shape, cell_size, origin
        );

        Self::zeros(shape, BoxGeometry::new(origin, cell_size)?)
    }

    pub fn geometry(&self) -> &BoxGeometry {
        &self.geometry
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

    pub(crate) fn channels_mut(&mut self) -> (&mut Array3<f64>, &mut Array3<f64>) {
        (&mut self.values, &mut self.weights)
    }

    /// Release the channels as flat row-major buffers.
    pub fn into_flat(self) -> (Vec<f64>, Vec<f64>) {
        (
            self.values.iter().copied().collect(),
            self.weights.iter().copied().collect(),
        )
    }
}
