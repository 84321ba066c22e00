//! Deposit a spherical survey map onto a Cartesian box.
//!
//! Every (radial interval `i`, declination `j`, right ascension `k`) sample
//! of the coordinate axes reads map cell `(i / d, k / d, j / d)` and adds
//! its two channels, weighted by
//!
//! ```text
//! alpha = r_i² sin(π/2 - dec_j) (r_{i+1} - r_i) (Δra / d) (Δdec / d) / cell_size³
//! ```
//!
//! where `Δra`, `Δdec` are the angular widths of one map cell and `d` is the
//! map's refinement factor, so each refined sample carries its own share.
//!
//! to the box cell containing the sample. Map cells whose two channels are
//! both exactly zero carry no data and are skipped outright.
//!
//! A fill makes two passes over the samples. The first checks every source
//! and box index per radial shell in parallel without writing anything;
//! the second recomputes the deposits and applies them in shell order, so
//! no cell is ever written from two threads.

use log::{debug, info, warn};
use ndarray::{Array3, Zip};
use rayon::prelude::*;

use crate::coords::{to_cartesian, volume_element, CoordinateAxes};
use crate::error::{PowerError, Result};
use crate::extent::ChannelExtent;
use crate::fft_box::{BoxGeometry, FftBox};
use crate::grid::{cell_count, checked_index};
use crate::params::{FillParams, PartialPenalty, PARTIAL_CELL_PENALTY};
use crate::survey::SurveyMap;

/// One map sample bound for one box cell.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Deposit {
    cell: [usize; 3],
    value: f64,
    weight: f64,
    alpha: f64,
}

/// Diagnostics from a fill.
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    /// Samples that reached the box.
    pub deposits: usize,
    /// Samples skipped because both map channels were zero.
    pub skipped: usize,
    /// Sum of `alpha * cell_volume` over all deposits.
    pub effective_volume: f64,
    pub value_extent: ChannelExtent,
    pub weight_extent: ChannelExtent,
}

/// Cell counts per completeness bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completeness {
    /// Cells with completeness `>= 1`.
    pub complete: usize,
    /// Cells with completeness in `(0, 1)`.
    pub partial: usize,
    /// Cells with no coverage.
    pub empty: usize,
}

impl Completeness {
    pub fn total(&self) -> usize {
        self.complete + self.partial + self.empty
    }
}

/// Diagnostics from a completeness-normalised fill.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFillReport {
    pub fill: FillReport,
    pub completeness: Completeness,
}

/// Deposit and skip counts of a validated fill.
#[derive(Debug, Clone, Copy, Default)]
struct Census {
    deposits: usize,
    skipped: usize,
}

/// Walk the samples of radial shell `i`, handing every non-empty one to
/// `deposit`. Returns the number of samples skipped as empty.
fn visit_shell<F: FnMut(Deposit)>(
    i: usize,
    survey: &SurveyMap,
    axes: &CoordinateAxes,
    geometry: &BoxGeometry,
    shape: [usize; 3],
    mut deposit: F,
) -> Result<usize> {
    let info = survey.info();
    // angular widths of one sample: a map cell spans `refine` samples per axis
    let refine = info.refine as f64;
    let solid_angle = (info.ra_step / refine) * (info.dec_step / refine);
    let cell_volume = geometry.cell_volume();
    let r = axes.r[i];
    let dr = axes.r[i + 1] - r;

    let mut skipped = 0;
    for (j, &dec) in axes.dec.iter().enumerate() {
        let alpha = volume_element(r, dec) * dr * solid_angle / cell_volume;
        for (k, &ra) in axes.ra.iter().enumerate() {
            let (value, weight) = survey.sample(survey.source_index(i, j, k)?);
            if value == 0.0 && weight == 0.0 {
                skipped += 1;
                continue;
            }
            let point = to_cartesian(r, dec, ra);
            let cell = checked_index(geometry.cell_of(&point), shape, "box")?;
            deposit(Deposit {
                cell,
                value,
                weight,
                alpha,
            });
        }
    }
    Ok(skipped)
}

/// Check every source and destination index without touching the box.
fn validate(survey: &SurveyMap, axes: &CoordinateAxes, fft_box: &FftBox) -> Result<Census> {
    if axes.r.len() < 2 {
        return Err(PowerError::geometry("radial axis needs at least two samples"));
    }
    let geometry = *fft_box.geometry();
    let shape = fft_box.shape();
    debug!(
        "Validating fill of {}x{}x{} samples into box {:?} (cell {:.4})",
        axes.r.len() - 1,
        axes.dec.len(),
        axes.ra.len(),
        shape,
        geometry.cell_size
    );

    let shells = (0..axes.r.len() - 1)
        .into_par_iter()
        .map(|i| -> Result<Census> {
            let mut deposits = 0;
            let skipped = visit_shell(i, survey, axes, &geometry, shape, |_| deposits += 1)?;
            Ok(Census { deposits, skipped })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(shells.iter().fold(Census::default(), |acc, s| Census {
        deposits: acc.deposits + s.deposits,
        skipped: acc.skipped + s.skipped,
    }))
}

/// Walk every shell in order, feeding deposits to `apply`. Only called
/// after `validate` succeeded. Returns the summed `alpha`.
fn apply_shells<F: FnMut(&Deposit)>(
    survey: &SurveyMap,
    axes: &CoordinateAxes,
    geometry: &BoxGeometry,
    shape: [usize; 3],
    mut apply: F,
) -> Result<f64> {
    let mut alpha_sum = 0.0;
    for i in 0..axes.r.len() - 1 {
        visit_shell(i, survey, axes, geometry, shape, |d| {
            alpha_sum += d.alpha;
            apply(&d);
        })?;
    }
    Ok(alpha_sum)
}

fn report(fft_box: &FftBox, census: Census, alpha_sum: f64) -> FillReport {
    let effective_volume = alpha_sum * fft_box.geometry().cell_volume();
    let value_extent = ChannelExtent::of(fft_box.values());
    let weight_extent = ChannelExtent::of(fft_box.weights());

    match (value_extent.min_max(), weight_extent.min_max()) {
        (Ok((min, max)), Ok((min2, max2))) => {
            debug!("Box values in [{min:e}, {max:e}], weights in [{min2:e}, {max2:e}]")
        }
        (values, weights) => warn!("Box channel scan failed: values {values:?}, weights {weights:?}"),
    }
    info!(
        "Filled {} samples ({} empty skipped), effective volume {:e}",
        census.deposits, census.skipped, effective_volume
    );

    FillReport {
        deposits: census.deposits,
        skipped: census.skipped,
        effective_volume,
        value_extent,
        weight_extent,
    }
}

/// Accumulate `value * alpha` and `weight * alpha` into the box.
///
/// The box keeps whatever it held before; contributions are added on top.
///
/// # Arguments
/// * `fft_box` - Destination box; its geometry places every sample
/// * `survey` - Source map, read at `(i / d, k / d, j / d)`
/// * `axes` - Sample positions, refined by the map's `refine` factor
///
/// # Returns
/// Deposit counts, effective volume and channel extents, or the first
/// geometry or index error. On error the box is left unchanged.
pub fn fill(fft_box: &mut FftBox, survey: &SurveyMap, axes: &CoordinateAxes) -> Result<FillReport> {
    let census = validate(survey, axes, fft_box)?;

    let geometry = *fft_box.geometry();
    let shape = fft_box.shape();
    let (values, weights) = fft_box.channels_mut();
    let alpha_sum = apply_shells(survey, axes, &geometry, shape, |d| {
        values[d.cell] += d.value * d.alpha;
        weights[d.cell] += d.weight * d.alpha;
    })?;

    Ok(report(fft_box, census, alpha_sum))
}

/// Accumulate `value * alpha²` and `weight * alpha²`, then penalise cells
/// the survey only partly covers.
///
/// Per-cell completeness is the sum of `alpha` deposited into it. Cells
/// with completeness in `(0, 1)` get `(1 - c) * 1e19` added to the value
/// channel, where `c` is chosen by `params.penalty`. The weight channel is
/// never penalised.
///
/// # Arguments
/// * `fft_box` - Destination box; its geometry places every sample
/// * `survey` - Source map, read at `(i / d, k / d, j / d)`
/// * `axes` - Sample positions, refined by the map's `refine` factor
/// * `params` - Partial-cell penalty formula
///
/// # Returns
/// The fill diagnostics plus the complete/partial/empty cell census, which
/// always sums to the box cell count. On error the box is left unchanged.
pub fn fill_normalized(
    fft_box: &mut FftBox,
    survey: &SurveyMap,
    axes: &CoordinateAxes,
    params: &FillParams,
) -> Result<NormalizedFillReport> {
    if params.penalty == PartialPenalty::Legacy && cell_count(fft_box.shape()) < 2 {
        return Err(PowerError::geometry(
            "legacy partial-cell penalty reads flat cell 1 and needs at least two box cells",
        ));
    }
    let census = validate(survey, axes, fft_box)?;

    let geometry = *fft_box.geometry();
    let shape = fft_box.shape();
    let mut completeness_map = Array3::<f64>::zeros((shape[0], shape[1], shape[2]));
    let (values, weights) = fft_box.channels_mut();
    let alpha_sum = apply_shells(survey, axes, &geometry, shape, |d| {
        let alpha2 = d.alpha * d.alpha;
        values[d.cell] += d.value * alpha2;
        weights[d.cell] += d.weight * alpha2;
        completeness_map[d.cell] += d.alpha;
    })?;

    let legacy_reference = completeness_map.iter().nth(1).copied().unwrap_or(0.0);
    let mut completeness = Completeness::default();
    Zip::from(&mut *values)
        .and(&completeness_map)
        .for_each(|value, &c| {
            if c >= 1.0 {
                completeness.complete += 1;
            } else if c > 0.0 {
                completeness.partial += 1;
                let reference = match params.penalty {
                    PartialPenalty::Legacy => legacy_reference,
                    PartialPenalty::PerCell => c,
                };
                *value += (1.0 - reference) * PARTIAL_CELL_PENALTY;
            } else {
                completeness.empty += 1;
            }
        });

    let total = completeness.total();
    info!(
        "Completeness: complete {}/{total}, partial {}/{total}, empty {}/{total}",
        completeness.complete, completeness.partial, completeness.empty
    );

    Ok(NormalizedFillReport {
        fill: report(fft_box, census, alpha_sum),
        completeness,
    })
}
