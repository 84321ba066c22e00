//! Survey coordinate axes and the spherical-to-Cartesian projection.
//!
//! Survey positions are given as (radial distance, declination, right
//! ascension). The projection used throughout the gridder is
//!
//! ```text
//! x = r * sin(π/2 - dec) * cos(ra)
//! y = r * sin(π/2 - dec) * sin(ra)
//! z = r * cos(π/2 - dec)
//! ```
//!
//! with the differential comoving volume element `r² sin(π/2 - dec)`.

use std::f64::consts::FRAC_PI_2;

use nalgebra::Vector3;

use crate::cosmology::Cosmology;
use crate::error::{PowerError, Result};

/// Project a spherical survey position onto Cartesian coordinates.
pub fn to_cartesian(r: f64, dec: f64, ra: f64) -> Vector3<f64> {
    let polar = FRAC_PI_2 - dec;
    Vector3::new(
        r * polar.sin() * ra.cos(),
        r * polar.sin() * ra.sin(),
        r * polar.cos(),
    )
}

/// Differential volume element `r² sin(π/2 - dec)` at a survey position.
pub fn volume_element(r: f64, dec: f64) -> f64 {
    r * r * (FRAC_PI_2 - dec).sin()
}

/// Subdivide every interval of a monotonic axis into `factor` equal steps.
///
/// The result has `factor * (n - 1) + 1` samples and ends on the last
/// input sample. A factor of one returns the axis unchanged.
pub fn refine_axis(axis: &[f64], factor: usize) -> Result<Vec<f64>> {
    if factor == 0 {
        return Err(PowerError::geometry("refinement factor must be at least 1"));
    }
    let Some(&last) = axis.last() else {
        return Ok(Vec::new());
    };

    let mut refined = Vec::with_capacity(factor * (axis.len() - 1) + 1);
    for pair in axis.windows(2) {
        let delta = (pair[1] - pair[0]) / factor as f64;
        for step in 0..factor {
            refined.push(pair[0] + step as f64 * delta);
        }
    }
    refined.push(last);
    Ok(refined)
}

fn validate_axis(name: &str, axis: &[f64], min_len: usize) -> Result<()> {
    if axis.len() < min_len {
        return Err(PowerError::geometry(format!(
            "{name} axis needs at least {min_len} samples, got {}",
            axis.len()
        )));
    }
    if let Some(i) = axis.iter().position(|v| !v.is_finite()) {
        return Err(PowerError::geometry(format!(
            "{name} axis sample {i} is not finite"
        )));
    }
    if let Some(i) = axis.windows(2).position(|w| w[1] <= w[0]) {
        return Err(PowerError::geometry(format!(
            "{name} axis is not strictly increasing at sample {}",
            i + 1
        )));
    }
    Ok(())
}

/// Ordered radial, declination and right-ascension samples of a survey.
///
/// Angles are in radians, distances in the same unit as the box cell size
/// (Mpc/h when built from frequencies).
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateAxes {
    pub r: Vec<f64>,
    pub dec: Vec<f64>,
    pub ra: Vec<f64>,
}

impl CoordinateAxes {
    /// Create axes, checking each is finite and strictly increasing.
    ///
    /// The radial axis needs two samples since the gridder walks radial
    /// intervals; the angular axes need one.
    pub fn new(r: Vec<f64>, dec: Vec<f64>, ra: Vec<f64>) -> Result<Self> {
        validate_axis("radial", &r, 2)?;
        validate_axis("declination", &dec, 1)?;
        validate_axis("right ascension", &ra, 1)?;
        Ok(Self { r, dec, ra })
    }

    /// Build axes from a map's frequency (Hz), RA and Dec (degrees) samples.
    ///
    /// Frequencies become comoving distances; RA is re-centred on its middle
    /// sample. Frequencies are expected in descending order so that the
    /// resulting distances increase.
    pub fn from_frequency(
        freq: &[f64],
        ra_deg: &[f64],
        dec_deg: &[f64],
        cosmology: &Cosmology,
    ) -> Result<Self> {
        let r = freq
            .iter()
            .map(|&f| cosmology.frequency_to_distance(f))
            .collect::<Result<Vec<_>>>()?;

        let mut ra: Vec<f64> = ra_deg.iter().map(|v| v.to_radians()).collect();
        if let Some(&ra0) = ra.get(ra.len() / 2) {
            ra.iter_mut().for_each(|v| *v -= ra0);
        }
        let dec = dec_deg.iter().map(|v| v.to_radians()).collect();

        Self::new(r, dec, ra)
    }

    /// Subdivide all three axes by the same factor.
    pub fn refined(&self, factor: usize) -> Result<Self> {
        Ok(Self {
            r: refine_axis(&self.r, factor)?,
            dec: refine_axis(&self.dec, factor)?,
            ra: refine_axis(&self.ra, factor)?,
        })
    }

    /// Mean RA cell width: peak-to-peak span over sample count.
    pub fn ra_step(&self) -> f64 {
        peak_to_peak(&self.ra) / self.ra.len() as f64
    }

    /// Mean Dec cell width: peak-to-peak span over sample count.
    pub fn dec_step(&self) -> f64 {
        peak_to_peak(&self.dec) / self.dec.len() as f64
    }

    /// Cartesian positions of every (r, dec, ra) sample combination.
    pub fn cartesian_points(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        self.r.iter().flat_map(move |&r| {
            self.dec
                .iter()
                .flat_map(move |&dec| self.ra.iter().map(move |&ra| to_cartesian(r, dec, ra)))
        })
    }
}

fn peak_to_peak(axis: &[f64]) -> f64 {
    match (axis.first(), axis.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn test_equator_projection() {
        let p = to_cartesian(2.0, 0.0, 0.0);
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);

        let p = to_cartesian(2.0, 0.0, FRAC_PI_4);
        assert_relative_eq!(p.x, 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_pole_projection() {
        let p = to_cartesian(3.0, FRAC_PI_2, 1.0);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-12);
        assert!(p.x.abs() < 1e-12 && p.y.abs() < 1e-12);
        assert!(volume_element(3.0, FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_projection_preserves_radius() {
        let p = to_cartesian(5.0, 0.3, -0.7);
        assert_relative_eq!(p.norm(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_refine_axis() {
        let refined = refine_axis(&[0.0, 1.0, 3.0], 2).unwrap();
        assert_eq!(refined, vec![0.0, 0.5, 1.0, 2.0, 3.0]);

        assert_eq!(refine_axis(&[1.0, 2.0], 1).unwrap(), vec![1.0, 2.0]);
        assert!(refine_axis(&[1.0, 2.0], 0).is_err());
        assert!(refine_axis(&[], 3).unwrap().is_empty());
    }

    #[test]
    fn test_axes_validation() {
        assert!(CoordinateAxes::new(vec![1.0, 2.0], vec![0.0], vec![0.0]).is_ok());
        assert!(CoordinateAxes::new(vec![1.0], vec![0.0], vec![0.0]).is_err());
        assert!(CoordinateAxes::new(vec![2.0, 1.0], vec![0.0], vec![0.0]).is_err());
        assert!(CoordinateAxes::new(vec![1.0, 2.0], vec![], vec![0.0]).is_err());
        assert!(CoordinateAxes::new(vec![1.0, f64::NAN], vec![0.0], vec![0.0]).is_err());
    }

    #[test]
    fn test_from_frequency_recentres_ra() {
        let cosmology = Cosmology::default();
        let freq = [800.0e6, 750.0e6, 700.0e6];
        let axes = CoordinateAxes::from_frequency(
            &freq,
            &[10.0, 11.0, 12.0, 13.0],
            &[-1.0, 0.0, 1.0],
            &cosmology,
        )
        .unwrap();

        // middle sample (index 2) becomes zero
        assert_relative_eq!(axes.ra[2], 0.0, epsilon = 1e-15);
        assert_relative_eq!(axes.ra[0], -2.0_f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(axes.ra_step(), 3.0_f64.to_radians() / 4.0, epsilon = 1e-12);
        assert_relative_eq!(axes.dec_step(), 2.0_f64.to_radians() / 3.0, epsilon = 1e-12);
        assert!(axes.r.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_cartesian_points_count() {
        let axes = CoordinateAxes::new(vec![1.0, 2.0], vec![0.0, 0.1, 0.2], vec![0.0, 0.5]).unwrap();
        assert_eq!(axes.cartesian_points().count(), 12);
    }
}
