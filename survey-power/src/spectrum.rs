//! Isotropic and (parallel, perpendicular) power spectra of a Fourier box.
//!
//! The input is a real field holding the power of every Fourier mode in
//! standard FFT order: along an axis of size `n`, index `c` is frequency
//! `c` for `2c <= n` and `c - n` otherwise. With per-axis fundamental
//! `1/n`, every mode except the DC term is placed into
//!
//! - one of `N` logarithmic bins of `|k|`, and
//! - when it lies in the configured half-space and both components are
//!   nonzero, one `(Np, Nv)` logarithmic bin of `(|k_x|, |(k_y, k_z)|)`.
//!
//! All bins run from `kmin = 1/nx` to `kmax = sqrt(3)` with bin index
//! `floor(log10(k / kmin) / log10(ratio))`. Each bin reports the mean
//! value of the modes that fell into it.

use log::{debug, warn};
use ndarray::{Array2, Array3};
use rayon::prelude::*;

use crate::error::{PowerError, Result};
use crate::grid::{array_from_flat, fold_frequency, shape_of};
use crate::params::{HalfSpace, RangePolicy, SpectrumParams};

/// Logarithmically spaced wavenumber bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogBins {
    kmin: f64,
    ratio: f64,
    count: usize,
    axis: &'static str,
}

impl LogBins {
    /// `count` bins spanning `[kmin, kmax)` with a constant ratio.
    pub fn new(kmin: f64, kmax: f64, count: usize, axis: &'static str) -> Result<Self> {
        if count == 0 {
            return Err(PowerError::DegenerateBin { axis, count });
        }
        let ratio = 10f64.powf((kmax / kmin).log10() / count as f64);
        Ok(Self {
            kmin,
            ratio,
            count,
            axis,
        })
    }

    pub fn kmin(&self) -> f64 {
        self.kmin
    }

    /// Ratio between consecutive bin edges.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Unchecked bin index; negative or `>= count` outside the range.
    pub fn raw_index(&self, k: f64) -> i64 {
        ((k / self.kmin).log10() / self.ratio.log10()).floor() as i64
    }

    /// Bin holding `k`, if any.
    pub fn index_of(&self, k: f64) -> Option<usize> {
        let index = self.raw_index(k);
        (index >= 0 && (index as usize) < self.count).then_some(index as usize)
    }

    /// Lower edge of bin `i`, used as its nominal wavenumber.
    pub fn center(&self, i: usize) -> f64 {
        self.kmin * self.ratio.powf(i as f64)
    }

    pub fn centers(&self) -> Vec<f64> {
        (0..self.count).map(|i| self.center(i)).collect()
    }
}

/// Isotropic and 2D spectra with their bin geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    /// Mean value per `|k|` bin (`val`).
    pub power: Vec<f64>,
    /// Modes per `|k|` bin.
    pub counts: Vec<usize>,
    pub bins: LogBins,
    /// Mean value per `(parallel, perpendicular)` bin, shape `(Np, Nv)`.
    pub power_2d: Array2<f64>,
    pub counts_2d: Array2<usize>,
    pub parallel_bins: LogBins,
    pub perpendicular_bins: LogBins,
    /// Modes dropped from the isotropic spectrum under `RangePolicy::Discard`.
    pub discarded: usize,
    /// Modes dropped from the 2D spectrum under `RangePolicy::Discard`.
    pub discarded_2d: usize,
}

impl PowerSpectrum {
    /// Bin wavenumbers of the isotropic spectrum (`k`).
    pub fn k(&self) -> Vec<f64> {
        self.bins.centers()
    }

    pub fn k_parallel(&self) -> Vec<f64> {
        self.parallel_bins.centers()
    }

    pub fn k_perpendicular(&self) -> Vec<f64> {
        self.perpendicular_bins.centers()
    }

    /// Axis wavenumbers in the flat `2 * Np` layout (`k2`): the first half
    /// holds `kmin * dkv^i`, the second `kmin * dkp^i`, for `i < Np`.
    pub fn packed_axis_centers(&self) -> Vec<f64> {
        let np = self.parallel_bins.count();
        let mut packed = Vec::with_capacity(2 * np);
        packed.extend((0..np).map(|i| self.perpendicular_bins.center(i)));
        packed.extend((0..np).map(|i| self.parallel_bins.center(i)));
        packed
    }

    /// Copy into caller-allocated flat buffers (`val`, `k`, `val2`, `k2`).
    ///
    /// Lengths are checked before anything is written.
    pub fn write_into(&self, val: &mut [f64], k: &mut [f64], val2: &mut [f64], k2: &mut [f64]) -> Result<()> {
        let n = self.bins.count();
        let np = self.parallel_bins.count();
        let nv = self.perpendicular_bins.count();
        for (name, len, expected) in [
            ("val", val.len(), n),
            ("k", k.len(), n),
            ("val2", val2.len(), np * nv),
            ("k2", k2.len(), 2 * np),
        ] {
            if len != expected {
                return Err(PowerError::geometry(format!(
                    "output buffer {name} has length {len}, expected {expected}"
                )));
            }
        }

        val.copy_from_slice(&self.power);
        k.copy_from_slice(&self.k());
        for (dst, src) in val2.iter_mut().zip(self.power_2d.iter()) {
            *dst = *src;
        }
        k2.copy_from_slice(&self.packed_axis_centers());
        Ok(())
    }
}

/// Running sums for one slab of the field.
#[derive(Debug, Clone)]
struct Accumulator {
    sum: Vec<f64>,
    count: Vec<usize>,
    sum_2d: Array2<f64>,
    count_2d: Array2<usize>,
    discarded: usize,
    discarded_2d: usize,
}

impl Accumulator {
    fn new(n: usize, np: usize, nv: usize) -> Self {
        Self {
            sum: vec![0.0; n],
            count: vec![0; n],
            sum_2d: Array2::zeros((np, nv)),
            count_2d: Array2::zeros((np, nv)),
            discarded: 0,
            discarded_2d: 0,
        }
    }

    fn merge(&mut self, other: &Accumulator) {
        for (a, b) in self.sum.iter_mut().zip(&other.sum) {
            *a += b;
        }
        for (a, b) in self.count.iter_mut().zip(&other.count) {
            *a += b;
        }
        self.sum_2d += &other.sum_2d;
        self.count_2d += &other.count_2d;
        self.discarded += other.discarded;
        self.discarded_2d += other.discarded_2d;
    }
}

struct Binner<'a> {
    field: &'a Array3<f64>,
    kunit: [f64; 3],
    bins: LogBins,
    parallel: LogBins,
    perpendicular: LogBins,
    half_space: HalfSpace,
    policy: RangePolicy,
}

impl Binner<'_> {
    /// Resolve a bin under the range policy: `Ok(None)` means discard.
    fn place(&self, bins: &LogBins, k: f64) -> Result<Option<usize>> {
        match (bins.index_of(k), self.policy) {
            (Some(index), _) => Ok(Some(index)),
            (None, RangePolicy::Discard) => Ok(None),
            (None, RangePolicy::Strict) => Err(PowerError::BinOutOfRange {
                axis: bins.axis,
                index: bins.raw_index(k),
                bins: bins.count(),
            }),
        }
    }

    fn accumulate_plane(&self, x: usize) -> Result<Accumulator> {
        let shape = shape_of(self.field);
        let mut acc = Accumulator::new(
            self.bins.count(),
            self.parallel.count(),
            self.perpendicular.count(),
        );

        let kx = fold_frequency(x, shape[0]) as f64 * self.kunit[0];
        for y in 0..shape[1] {
            let ky = fold_frequency(y, shape[1]) as f64 * self.kunit[1];
            for z in 0..shape[2] {
                if x == 0 && y == 0 && z == 0 {
                    continue;
                }
                let fz = fold_frequency(z, shape[2]);
                let kz = fz as f64 * self.kunit[2];
                let value = self.field[[x, y, z]];

                let k = (kx * kx + ky * ky + kz * kz).sqrt();
                match self.place(&self.bins, k)? {
                    Some(i) => {
                        acc.sum[i] += value;
                        acc.count[i] += 1;
                    }
                    None => acc.discarded += 1,
                }

                let in_half = match self.half_space {
                    HalfSpace::NonNegativeParallel => kx >= 0.0,
                    HalfSpace::NonNegativeZ => fz >= 0,
                };
                if !in_half {
                    continue;
                }
                let k_par = kx.abs();
                let k_perp = (ky * ky + kz * kz).sqrt();
                if k_par == 0.0 || k_perp == 0.0 {
                    continue;
                }
                match (
                    self.place(&self.parallel, k_par)?,
                    self.place(&self.perpendicular, k_perp)?,
                ) {
                    (Some(p), Some(v)) => {
                        acc.sum_2d[[p, v]] += value;
                        acc.count_2d[[p, v]] += 1;
                    }
                    _ => acc.discarded_2d += 1,
                }
            }
        }
        Ok(acc)
    }
}

/// Bin a Fourier power box into isotropic and 2D spectra.
///
/// The DC mode is skipped; every other mode adds to exactly one isotropic
/// bin, and to one 2D bin when it lies in `params.half_space` with nonzero
/// parallel and perpendicular components. Each bin reports the mean of its
/// modes, or 0 when empty.
///
/// # Arguments
/// * `field` - Power per Fourier mode in standard FFT order
/// * `params` - Bin counts, half-space and out-of-range policy
///
/// # Returns
/// The binned spectra with their bin geometry, `DegenerateBin` for a zero
/// bin count, or `BinOutOfRange` under `RangePolicy::Strict`.
pub fn make_pk(field: &Array3<f64>, params: &SpectrumParams) -> Result<PowerSpectrum> {
    let shape = shape_of(field);
    if shape.iter().any(|&n| n == 0) {
        return Err(PowerError::geometry(format!(
            "Fourier field shape {shape:?} has an empty axis"
        )));
    }

    let kunit = shape.map(|n| 1.0 / n as f64);
    let kmax = shape
        .iter()
        .zip(kunit.iter())
        .map(|(&n, &u)| (n as f64 * u).powi(2))
        .sum::<f64>()
        .sqrt();
    let kmin = kunit[0];

    let binner = Binner {
        field,
        kunit,
        bins: LogBins::new(kmin, kmax, params.bins, "isotropic")?,
        parallel: LogBins::new(kmin, kmax, params.parallel_bins, "parallel")?,
        perpendicular: LogBins::new(kmin, kmax, params.perpendicular_bins, "perpendicular")?,
        half_space: params.half_space,
        policy: params.range_policy,
    };
    debug!(
        "Binning {:?} modes: kmin {:.4e}, kmax {:.4e}, dk {:.4}, dkp {:.4}, dkv {:.4}",
        shape,
        kmin,
        kmax,
        binner.bins.ratio(),
        binner.parallel.ratio(),
        binner.perpendicular.ratio()
    );

    let planes = (0..shape[0])
        .into_par_iter()
        .map(|x| binner.accumulate_plane(x))
        .collect::<Result<Vec<_>>>()?;

    let mut total = Accumulator::new(params.bins, params.parallel_bins, params.perpendicular_bins);
    for plane in &planes {
        total.merge(plane);
    }

    if total.discarded > 0 || total.discarded_2d > 0 {
        warn!(
            "Discarded {} isotropic and {} 2D modes outside the bin range",
            total.discarded, total.discarded_2d
        );
    }

    let power = total
        .sum
        .iter()
        .zip(&total.count)
        .map(|(&s, &c)| if c != 0 { s / c as f64 } else { s })
        .collect();
    let mut power_2d = total.sum_2d;
    power_2d.zip_mut_with(&total.count_2d, |s, &c| {
        if c != 0 {
            *s /= c as f64;
        }
    });

    Ok(PowerSpectrum {
        power,
        counts: total.count,
        bins: binner.bins,
        power_2d,
        counts_2d: total.count_2d,
        parallel_bins: binner.parallel,
        perpendicular_bins: binner.perpendicular,
        discarded: total.discarded,
        discarded_2d: total.discarded_2d,
    })
}

/// `make_pk` over a flat row-major buffer with explicit axis sizes.
pub fn make_pk_flat(data: Vec<f64>, shape: [usize; 3], params: &SpectrumParams) -> Result<PowerSpectrum> {
    make_pk(&array_from_flat(data, shape)?, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_bins() {
        let bins = LogBins::new(0.1, 10.0, 4, "isotropic").unwrap();
        assert_relative_eq!(bins.ratio(), 10f64.sqrt(), epsilon = 1e-12);
        assert_eq!(bins.index_of(0.1), Some(0));
        assert_eq!(bins.index_of(0.5), Some(1));
        assert_eq!(bins.index_of(9.9), Some(3));
        assert_eq!(bins.index_of(10.5), None);
        assert_eq!(bins.index_of(0.05), None);
        assert!(bins.raw_index(0.05) < 0);
        assert_relative_eq!(bins.center(2), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_bins_rejected() {
        let field = Array3::<f64>::ones((4, 4, 4));
        for params in [
            SpectrumParams::new(0, 4, 4),
            SpectrumParams::new(8, 0, 4),
            SpectrumParams::new(8, 4, 0),
        ] {
            let err = make_pk(&field, &params).unwrap_err();
            assert!(matches!(err, PowerError::DegenerateBin { count: 0, .. }));
        }
    }

    #[test]
    fn test_uniform_field_counts_every_mode_once() {
        let field = Array3::<f64>::ones((4, 4, 4));
        let pk = make_pk(&field, &SpectrumParams::new(8, 4, 4)).unwrap();

        assert_eq!(pk.counts.iter().sum::<usize>(), 63);
        for (&p, &c) in pk.power.iter().zip(&pk.counts) {
            if c > 0 {
                assert_eq!(p, 1.0);
            } else {
                assert_eq!(p, 0.0);
            }
        }
        for (&p, &c) in pk.power_2d.iter().zip(pk.counts_2d.iter()) {
            if c > 0 {
                assert_eq!(p, 1.0);
            }
        }
        assert_eq!(pk.discarded, 0);
    }

    #[test]
    fn test_single_mode_lands_in_first_bin() {
        let mut field = Array3::<f64>::zeros((4, 4, 4));
        field[[1, 0, 0]] = 7.0;
        let pk = make_pk(&field, &SpectrumParams::new(8, 4, 4)).unwrap();

        // the six modes with |k| = 1/4 share bin 0
        assert_eq!(pk.counts[0], 6);
        assert_relative_eq!(pk.power[0], 7.0 / 6.0, epsilon = 1e-15);
        assert!(pk.power[1..].iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_dc_mode_ignored() {
        let mut field = Array3::<f64>::zeros((4, 4, 4));
        field[[0, 0, 0]] = 1.0e6;
        let pk = make_pk(&field, &SpectrumParams::new(8, 4, 4)).unwrap();
        assert!(pk.power.iter().all(|&p| p == 0.0));
        assert!(pk.power_2d.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_half_space_selection() {
        let field = Array3::<f64>::ones((4, 4, 4));

        // x in {1, 2}, (y, z) != (0, 0)
        let pk = make_pk(&field, &SpectrumParams::new(8, 4, 4)).unwrap();
        assert_eq!(pk.counts_2d.iter().sum::<usize>(), 30);

        // x != 0, z in {0, 1, 2}, (y, z) != (0, 0)
        let params = SpectrumParams {
            half_space: HalfSpace::NonNegativeZ,
            ..SpectrumParams::new(8, 4, 4)
        };
        let pk = make_pk(&field, &params).unwrap();
        assert_eq!(pk.counts_2d.iter().sum::<usize>(), 33);
    }

    #[test]
    fn test_negative_parallel_modes_skip_2d() {
        let mut field = Array3::<f64>::zeros((4, 4, 4));
        field[[3, 1, 0]] = 5.0; // k_x = -1/4
        let pk = make_pk(&field, &SpectrumParams::new(8, 4, 4)).unwrap();
        assert!(pk.power_2d.iter().all(|&p| p == 0.0));
        assert!(pk.power.iter().any(|&p| p > 0.0));

        let mut field = Array3::<f64>::zeros((4, 4, 4));
        field[[1, 1, 0]] = 5.0;
        let pk = make_pk(&field, &SpectrumParams::new(8, 4, 4)).unwrap();
        let p = pk.parallel_bins.index_of(0.25).unwrap();
        let v = pk.perpendicular_bins.index_of(0.25).unwrap();
        assert!(pk.power_2d[[p, v]] > 0.0);
    }

    #[test]
    fn test_strict_policy_rejects_short_kmin() {
        // y fundamental 1/8 falls below kmin = 1/4
        let field = Array3::<f64>::ones((4, 8, 4));
        let err = make_pk(&field, &SpectrumParams::new(8, 4, 4)).unwrap_err();
        assert!(matches!(err, PowerError::BinOutOfRange { index, .. } if index < 0));
    }

    #[test]
    fn test_discard_policy_counts_dropped_modes() {
        let field = Array3::<f64>::ones((4, 8, 4));
        let params = SpectrumParams {
            range_policy: RangePolicy::Discard,
            ..SpectrumParams::new(8, 4, 4)
        };
        let pk = make_pk(&field, &params).unwrap();
        // (0, ±1, 0) have |k| = 1/8
        assert_eq!(pk.discarded, 2);
        assert_eq!(pk.counts.iter().sum::<usize>() + pk.discarded, 4 * 8 * 4 - 1);
    }

    #[test]
    fn test_repeat_runs_identical() {
        let data: Vec<f64> = (0..6 * 6 * 6).map(|i| ((i * 37) % 11) as f64).collect();
        let params = SpectrumParams::new(10, 5, 5);
        let a = make_pk_flat(data.clone(), [6, 6, 6], &params).unwrap();
        let b = make_pk_flat(data, [6, 6, 6], &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_write_into_flat_buffers() {
        let field = Array3::<f64>::ones((4, 4, 4));
        let pk = make_pk(&field, &SpectrumParams::new(8, 3, 5)).unwrap();

        let mut val = vec![0.0; 8];
        let mut k = vec![0.0; 8];
        let mut val2 = vec![0.0; 15];
        let mut k2 = vec![0.0; 6];
        pk.write_into(&mut val, &mut k, &mut val2, &mut k2).unwrap();

        assert_eq!(val, pk.power);
        assert_relative_eq!(k[0], 0.25, epsilon = 1e-15);
        assert_eq!(val2[7], pk.power_2d[[1, 2]]);
        assert_relative_eq!(k2[1], 0.25 * pk.perpendicular_bins.ratio(), epsilon = 1e-15);
        assert_relative_eq!(k2[4], 0.25 * pk.parallel_bins.ratio(), epsilon = 1e-15);

        let mut short = vec![0.0; 5];
        assert!(pk.write_into(&mut val, &mut k, &mut val2, &mut short).is_err());
    }
}
