//!
//! # Pyramid wavefront sensor
//!
//! [PyramidWfs] calibrates the pupil registration of the four pupil images formed by the
//! pyramid on the detector and computes the slopes from the detector frames.
//!
//! The detector pixel `(x,y)` is at row `x` and column `y` of a `nx x ny` frame.
//! The frame is split into 4 quadrants, each holding one pupil image:
//!  - lower-left:  `x < nx/2`, `y < ny/2`
//!  - lower-right: `x < nx/2`, `y > ny/2`
//!  - upper-left:  `x > nx/2`, `y < ny/2`
//!  - upper-right: `x > nx/2`, `y > ny/2`
//!
//! and the slopes are given by
//!  - `sx = (upper-right + upper-left - lower-right - lower-left) / norm`
//!  - `sy = (lower-right + upper-right - lower-left - upper-left) / norm`

use std::{convert::Infallible, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{data_processing::Slopes, Modulation};

mod builder;
pub use builder::{BuilderError, PyramidWfsBuilder};
#[allow(clippy::module_inception)]
mod pyramid;
pub use pyramid::PyramidWfs;
mod registration;
pub use registration::{subaperture_diameter, PupilRegistration, Quadrant};

#[derive(Debug, thiserror::Error)]
pub enum PyramidError {
    #[error("the number of valid sub-apertures per pupil image are different: {0:?}")]
    RegistrationMismatch([usize; 4]),
    #[error(r#"normalization supported: "QUADCELL", "MEAN_FLUX_PER_SUBAP", found "{0}""#)]
    InvalidNormalizationMode(String),
    #[error(r#"output format supported: "vector", "list", found "{0}""#)]
    InvalidOutputFormat(String),
    #[error("the pyramid has not been calibrated")]
    Uncalibrated,
    #[error("no photons in the calibration frame")]
    ZeroFlux,
    #[error("no photons in the {0} pupil image of the calibration frame")]
    ZeroFluxQuadrant(Quadrant),
    #[error("the detector frame must be square with an even size, found {0:?}")]
    FrameShape((usize, usize)),
    #[error("the pupil registration is {registration:?}px but the detector frame is {frame:?}px")]
    ResolutionMismatch {
        registration: (usize, usize),
        frame: (usize, usize),
    },
    #[error("the pupil registration has no valid sub-aperture (flux threshold: {0})")]
    NoValidSubaperture(f64),
    #[error("the {0} pupil mask is not a sorted set of pixels of the pupil registration frame")]
    InvalidPupilMask(Quadrant),
    #[error("{reference:?} reference slopes for {n_valid} valid sub-apertures")]
    ReferenceMismatch {
        n_valid: usize,
        reference: (usize, usize),
    },
}
impl From<Infallible> for PyramidError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}
pub type Result<T> = std::result::Result<T, PyramidError>;

/// Normalization of the flux differences into slopes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizationMode {
    /// Each sub-aperture is normalized by its own flux
    #[serde(rename = "QUADCELL")]
    QuadCell,
    /// All the sub-apertures are normalized by the mean flux per sub-aperture
    #[default]
    #[serde(rename = "MEAN_FLUX_PER_SUBAP")]
    MeanFluxPerSubap,
}
impl FromStr for NormalizationMode {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUADCELL" => Ok(Self::QuadCell),
            "MEAN_FLUX_PER_SUBAP" => Ok(Self::MeanFluxPerSubap),
            _ => Err(PyramidError::InvalidNormalizationMode(s.to_string())),
        }
    }
}
impl TryFrom<&str> for NormalizationMode {
    type Error = PyramidError;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}
impl Display for NormalizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuadCell => f.write_str("QUADCELL"),
            Self::MeanFluxPerSubap => f.write_str("MEAN_FLUX_PER_SUBAP"),
        }
    }
}

/// Layout of the measurements returned by [PyramidWfs]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `[sx,sy]` concatenated in a single vector
    #[default]
    Vector,
    /// `sx` and `sy` apart
    List,
}
impl FromStr for OutputFormat {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vector" => Ok(Self::Vector),
            "list" => Ok(Self::List),
            _ => Err(PyramidError::InvalidOutputFormat(s.to_string())),
        }
    }
}
impl TryFrom<&str> for OutputFormat {
    type Error = PyramidError;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

/// Pyramid measurements in the [OutputFormat] layout
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    Vector(Vec<f32>),
    List(Vec<f32>, Vec<f32>),
}
impl From<(Slopes, OutputFormat)> for Measurement {
    fn from((slopes, format): (Slopes, OutputFormat)) -> Self {
        match format {
            OutputFormat::Vector => Measurement::Vector(slopes.to_vec()),
            OutputFormat::List => {
                let (sx, sy) = slopes.into_pair();
                Measurement::List(sx, sy)
            }
        }
    }
}
impl Measurement {
    /// Returns the measurements as a single vector `[sx,sy]`
    pub fn into_vec(self) -> Vec<f32> {
        match self {
            Self::Vector(sxy) => sxy,
            Self::List(mut sx, sy) => {
                sx.extend(sy);
                sx
            }
        }
    }
}

/// Pupil registration parameters
///
/// Default properties:
///  - modulation: 10 lambda/D sampled with 64 points
///  - extra sub-apertures: 0%
///  - flux threshold: 0 (no refinement)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub modulation: Modulation,
    pub extra_subapertures_percent: f64,
    pub flux_threshold: f64,
}
impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            modulation: Modulation::new(10., 64),
            extra_subapertures_percent: 0.,
            flux_threshold: 0.,
        }
    }
}
impl CalibrationParams {
    /// Sets the modulation amplitude (lambda/D) and sampling applied during calibration
    pub fn modulation(mut self, amplitude: f32, sampling: usize) -> Self {
        self.modulation = Modulation::new(amplitude, sampling);
        self
    }
    /// Sets the percentage of sub-apertures added across the pupil to the initial registration
    pub fn extra_subapertures_percent(mut self, percent: f64) -> Self {
        self.extra_subapertures_percent = percent;
        self
    }
    /// Sets the flux threshold, relative to the mean flux per sub-aperture, of the registration refinement
    pub fn flux_threshold(mut self, flux_threshold: f64) -> Self {
        self.flux_threshold = flux_threshold;
        self
    }
}

/// [PyramidWfs] calibration state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    #[default]
    Uncalibrated,
    Calibrating,
    Calibrated,
}
