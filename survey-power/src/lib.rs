//! Power spectrum estimation for spherical intensity-mapping surveys.
//!
//! A survey map sampled on (radial distance, declination, right ascension)
//! is deposited onto a Cartesian box (`gridder`), transformed by the
//! caller's FFT, and the resulting mode powers are binned into isotropic
//! and (parallel, perpendicular) spectra on logarithmic wavenumber bins
//! (`spectrum`).

pub mod coords;
pub mod cosmology;
pub mod error;
pub mod extent;
pub mod fft_box;
pub mod grid;
pub mod gridder;
pub mod params;
pub mod spectrum;
pub mod survey;

pub use coords::CoordinateAxes;
pub use cosmology::Cosmology;
pub use error::{PowerError, Result};
pub use fft_box::{BoxGeometry, FftBox};
pub use gridder::{fill, fill_normalized, Completeness, FillReport, NormalizedFillReport};
pub use params::{BoxParams, FillParams, HalfSpace, JsonParams, PartialPenalty, RangePolicy, SpectrumParams};
pub use spectrum::{make_pk, make_pk_flat, LogBins, PowerSpectrum};
pub use survey::{MapInfo, SurveyMap};
