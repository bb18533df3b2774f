//!
//! # Wavefront sensors
//!
//! The optical model of a wavefront sensor (the propagation of a guide star through the
//! pyramid and onto the detector) is abstracted by the [WavefrontSensor] trait.
//! The pyramid calibration and signal processing in [pyramid] only relies on that trait,
//! any detector able to reset, propagate a guide star and share its frame can be used.

use serde::{Deserialize, Serialize};

pub mod data_processing;
mod frame;
pub use frame::Frame;
mod ideal;
pub use ideal::{IdealDetector, ModulatedSource, PhotonSource};
pub mod pyramid;

/// Pyramid modulation
///
/// The amplitude is given in units of lambda/D and the sampling is the number of
/// points along the modulation circle
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modulation {
    pub amplitude: f32,
    pub sampling: usize,
}
impl Modulation {
    pub fn new(amplitude: f32, sampling: usize) -> Self {
        Self {
            amplitude,
            sampling,
        }
    }
}

/// Lenslet array specifications
///
/// The number of equivalent lenslets across the pupil and the number of pixels per lenslet
#[derive(Debug, Clone, PartialEq, Copy, Serialize, Deserialize)]
pub struct LensletArray {
    pub n_side_lenslet: usize,
    pub n_px_lenslet: usize,
}
impl Default for LensletArray {
    fn default() -> Self {
        LensletArray {
            n_side_lenslet: 30,
            n_px_lenslet: 8,
        }
    }
}
impl LensletArray {
    /// Returns the pupil sampling in pixels
    pub fn pupil_sampling(&self) -> usize {
        self.n_side_lenslet * self.n_px_lenslet
    }
}

/// Wavefront sensor optics and detector interface
pub trait WavefrontSensor {
    /// The source of photons propagated through the sensor
    type GuideStar;
    /// Clears the detector frame
    fn reset(&mut self);
    /// Propagates the guide star to the detector, adding photons to the frame
    fn propagate(&mut self, src: &mut Self::GuideStar);
    /// Returns the current detector frame
    fn frame(&self) -> &Frame;
    /// Returns the current modulation
    fn modulation(&self) -> Modulation;
    /// Sets the modulation applied at the next propagation
    fn set_modulation(&mut self, modulation: Modulation);
    /// Sets the detector photoelectron gain
    fn set_photoelectron_gain(&mut self, gain: f32);
}

impl<T: WavefrontSensor + ?Sized> WavefrontSensor for &mut T {
    type GuideStar = T::GuideStar;
    fn reset(&mut self) {
        T::reset(*self);
    }
    fn propagate(&mut self, src: &mut Self::GuideStar) {
        T::propagate(*self, src);
    }
    fn frame(&self) -> &Frame {
        T::frame(&**self)
    }
    fn modulation(&self) -> Modulation {
        T::modulation(&**self)
    }
    fn set_modulation(&mut self, modulation: Modulation) {
        T::set_modulation(*self, modulation);
    }
    fn set_photoelectron_gain(&mut self, gain: f32) {
        T::set_photoelectron_gain(*self, gain);
    }
}
