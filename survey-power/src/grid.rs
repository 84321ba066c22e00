//! Row-major 3D array helpers.
//!
//! All flat survey, box and Fourier buffers are viewed as C-ordered
//! `ndarray::Array3<f64>`, so `a[[x, y, z]]` addresses flat element
//! `x * ny * nz + y * nz + z`. The helpers here cover the two things
//! `ndarray` does not: building an array from untrusted flat metadata and
//! turning a signed, possibly negative, computed index into a checked one.

use ndarray::Array3;

use crate::error::{PowerError, Result};

/// Wrap a flat buffer with its shape metadata, rejecting mismatched lengths.
pub fn array_from_flat(data: Vec<f64>, shape: [usize; 3]) -> Result<Array3<f64>> {
    let expected = cell_count(shape);
    if data.len() != expected {
        return Err(PowerError::geometry(format!(
            "shape {:?} needs {} elements but {} were supplied",
            shape,
            expected,
            data.len()
        )));
    }
    Ok(Array3::from_shape_vec((shape[0], shape[1], shape[2]), data)?)
}

/// Total number of cells in a 3D shape.
pub fn cell_count(shape: [usize; 3]) -> usize {
    shape[0] * shape[1] * shape[2]
}

/// Shape of an `Array3` as a fixed array.
pub fn shape_of(array: &Array3<f64>) -> [usize; 3] {
    let dim = array.dim();
    [dim.0, dim.1, dim.2]
}

/// Validate a signed index against a shape.
///
/// `what` names the array in the resulting `IndexOutOfRange` error.
pub fn checked_index(index: [i64; 3], shape: [usize; 3], what: &'static str) -> Result<[usize; 3]> {
    let inside = index
        .iter()
        .zip(shape.iter())
        .all(|(&i, &n)| i >= 0 && (i as u64) < n as u64);
    if !inside {
        return Err(PowerError::IndexOutOfRange { what, index, shape });
    }
    Ok([index[0] as usize, index[1] as usize, index[2] as usize])
}

/// Fold an FFT index into its signed frequency.
///
/// Indices past the midpoint wrap to `coord - n`. The midpoint itself
/// (the Nyquist plane of an even axis) stays on the non-negative side.
pub fn fold_frequency(coord: usize, n: usize) -> i64 {
    if 2 * coord > n {
        coord as i64 - n as i64
    } else {
        coord as i64
    }
}
