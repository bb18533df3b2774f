//!
//! # CEO pyramid wavefront sensor
//!
//! Calibration and signal processing of the pyramid wavefront sensor used to close the
//! adaptive optics loop of [CEO](https://github.com/rconan/CEO) simulations.
//!
//! The optical propagation and the detector are provided by any type implementing
//! [`WavefrontSensor`]; [`PyramidWfs`] registers the four pupil images on the detector,
//! records the reference slopes and turns every new detector frame into slopes.
//!
//! ```
//! use ceo_pyramid::{Frame, IdealDetector, PyramidWfsBuilder};
//!
//! // four uniform pupil images of radius 4px centered in each quadrant of a 64x64 frame
//! let pupils = Frame::from_fn((64, 64), |x, y| {
//!     let inside = |cx: f64, cy: f64| (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) <= 16.;
//!     let centers = [(16., 16.), (16., 48.), (48., 16.), (48., 48.)];
//!     if centers.iter().any(|&(cx, cy)| inside(cx, cy)) { 1f32 } else { 0f32 }
//! });
//! let mut gs = pupils.clone();
//!
//! let mut pym = PyramidWfsBuilder::new()
//!     .n_lenslet(8)
//!     .build(IdealDetector::new((64, 64)))
//!     .unwrap();
//! pym.calibrate(&mut gs).unwrap();
//! pym.analyze(&mut gs).unwrap();
//! assert!(pym.data().unwrap().to_vec().iter().all(|s| *s == 0f32));
//! ```

pub mod atmosphere;
pub mod error;
pub mod utilities;
pub mod wavefrontsensor;

#[doc(inline)]
pub use self::atmosphere::{PhaseScreenMetadata, PhaseScreenSweep, TurbulenceStatistics};
#[doc(inline)]
pub use self::error::CeoPyramidError;
#[doc(inline)]
pub use self::utilities::PupilMask;
#[doc(inline)]
pub use self::wavefrontsensor::{
    data_processing::{DataRef, Slopes},
    Frame, IdealDetector, LensletArray, ModulatedSource, Modulation, PhotonSource, WavefrontSensor,
};
#[doc(inline)]
pub use self::wavefrontsensor::pyramid::{
    CalibrationParams, CalibrationState, Measurement, NormalizationMode, OutputFormat,
    PupilRegistration, PyramidError, PyramidWfs, PyramidWfsBuilder, Quadrant,
};

pub type Result<T> = std::result::Result<T, CeoPyramidError>;
