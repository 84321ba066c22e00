//! Redshifted 21 cm frequency to comoving distance.

use serde::{Deserialize, Serialize};

use crate::error::{PowerError, Result};

/// Rest frequency of the neutral hydrogen 21 cm line in Hz.
pub const HI_REST_FREQUENCY: f64 = 1.42e9;

/// Hubble distance c/H0 in Mpc/h.
const HUBBLE_DISTANCE: f64 = 2997.92458;

/// Simpson intervals used for the 1/E(z) integral (must be even).
const INTEGRATION_STEPS: usize = 2048;

/// Background cosmology used to turn redshift into distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cosmology {
    pub omega_m: f64,
    pub omega_lambda: f64,
    /// Dimensionless Hubble parameter. Distances here are in Mpc/h, so it
    /// does not enter them; it is kept for converting results to Mpc.
    pub h: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self {
            omega_m: 0.27,
            omega_lambda: 0.73,
            h: 0.72,
        }
    }
}

impl Cosmology {
    /// Curvature density Ωk = 1 - Ωm - ΩΛ.
    pub fn omega_k(&self) -> f64 {
        1.0 - self.omega_m - self.omega_lambda
    }

    /// Dimensionless Hubble rate E(z) = H(z)/H0.
    pub fn e_of_z(&self, z: f64) -> f64 {
        let a = 1.0 + z;
        (self.omega_m * a * a * a + self.omega_k() * a * a + self.omega_lambda).sqrt()
    }

    /// Line-of-sight comoving distance to redshift `z` in Mpc/h.
    pub fn comoving_distance(&self, z: f64) -> f64 {
        HUBBLE_DISTANCE * simpson(|zz| 1.0 / self.e_of_z(zz), 0.0, z, INTEGRATION_STEPS)
    }

    /// Transverse comoving distance to redshift `z` in Mpc/h.
    pub fn transverse_distance(&self, z: f64) -> f64 {
        let dc = self.comoving_distance(z);
        let ok = self.omega_k();
        if ok.abs() < 1e-12 {
            return dc;
        }
        let root = ok.abs().sqrt();
        let x = root * dc / HUBBLE_DISTANCE;
        if ok > 0.0 {
            HUBBLE_DISTANCE / root * x.sinh()
        } else {
            HUBBLE_DISTANCE / root * x.sin()
        }
    }

    /// Distance (Mpc/h) to gas emitting 21 cm radiation observed at `freq` Hz.
    pub fn frequency_to_distance(&self, freq: f64) -> Result<f64> {
        if !(freq.is_finite() && freq > 0.0) {
            return Err(PowerError::geometry(format!(
                "observed frequency must be positive, got {freq}"
            )));
        }
        let z = HI_REST_FREQUENCY / freq - 1.0;
        Ok(self.transverse_distance(z))
    }
}

/// Composite Simpson integration of `f` over [a, b] with `n` (even) intervals.
fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, n: usize) -> f64 {
    let h = (b - a) / n as f64;
    let mut sum = f(a) + f(b);
    for i in 1..n {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + i as f64 * h);
    }
    sum * h / 3.0
}
