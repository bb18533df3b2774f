use std::marker::PhantomData;

use super::{Frame, Modulation, WavefrontSensor};

/// Source of photons on the detector
///
/// Returns the photon map reaching the detector for the given pyramid modulation
///
/// # Panics
///
/// [IdealDetector] panics if the photon map and the detector frame have different
/// resolutions, and so do [PyramidWfs::calibrate](crate::PyramidWfs::calibrate)
/// and [PyramidWfs::analyze](crate::PyramidWfs::analyze) with such a guide star.
pub trait PhotonSource {
    fn photons(&mut self, modulation: Modulation) -> Frame;
}
impl PhotonSource for Frame {
    /// The photon map does not depend on the modulation
    fn photons(&mut self, _modulation: Modulation) -> Frame {
        self.clone()
    }
}

/// A [PhotonSource] computing the photon map from the modulation
pub struct ModulatedSource<F>(pub F);
impl<F> PhotonSource for ModulatedSource<F>
where
    F: FnMut(Modulation) -> Frame,
{
    fn photons(&mut self, modulation: Modulation) -> Frame {
        (self.0)(modulation)
    }
}

/// Noiseless detector
///
/// Integrates the photon maps of [PhotonSource] guide stars scaled by the photoelectron gain.
/// It stands for the pyramid optics and camera in offline replays of recorded or
/// synthetic frames.
#[derive(Debug, Clone)]
pub struct IdealDetector<G = Frame> {
    frame: Frame,
    modulation: Modulation,
    photoelectron_gain: f32,
    n_frame: usize,
    guide_star: PhantomData<G>,
}
impl<G> IdealDetector<G> {
    /// Creates a detector with a `nx x ny` frame
    pub fn new(resolution: (usize, usize)) -> Self {
        Self {
            frame: Frame::zeros(resolution),
            modulation: Default::default(),
            photoelectron_gain: 1f32,
            n_frame: 0,
            guide_star: PhantomData,
        }
    }
    /// Returns the number of propagations integrated in the frame since the last reset
    pub fn n_frame(&self) -> usize {
        self.n_frame
    }
    /// Returns the detector photoelectron gain
    pub fn photoelectron_gain(&self) -> f32 {
        self.photoelectron_gain
    }
}

impl<G: PhotonSource> WavefrontSensor for IdealDetector<G> {
    type GuideStar = G;

    fn reset(&mut self) {
        self.frame.value.iter_mut().for_each(|v| *v = 0f32);
        self.n_frame = 0;
    }

    fn propagate(&mut self, src: &mut G) {
        let photons = src.photons(self.modulation);
        assert_eq!(
            photons.resolution, self.frame.resolution,
            "guide star photon map does not match the detector resolution"
        );
        self.frame += &(photons * self.photoelectron_gain);
        self.n_frame += 1;
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn modulation(&self) -> Modulation {
        self.modulation
    }

    fn set_modulation(&mut self, modulation: Modulation) {
        self.modulation = modulation;
    }

    fn set_photoelectron_gain(&mut self, gain: f32) {
        self.photoelectron_gain = gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrate() {
        let mut det = IdealDetector::<Frame>::new((4, 4));
        det.set_photoelectron_gain(0.5);
        let mut gs = Frame::from_fn((4, 4), |x, _| x as f32);
        det.propagate(&mut gs);
        det.propagate(&mut gs);
        assert_eq!(det.n_frame(), 2);
        assert_eq!(det.frame().get(3, 0), Some(&3.));
        det.reset();
        assert_eq!(det.frame().sum(), 0.);
    }

    #[test]
    #[should_panic(expected = "guide star photon map does not match the detector resolution")]
    fn resolution_mismatch() {
        let mut det = IdealDetector::<Frame>::new((4, 4));
        det.propagate(&mut Frame::zeros((2, 2)));
    }

    #[test]
    fn modulated() {
        let mut det = IdealDetector::new((2, 2));
        let mut gs = ModulatedSource(|m: Modulation| Frame::from_fn((2, 2), |_, _| m.amplitude));
        det.set_modulation(Modulation::new(3., 16));
        det.propagate(&mut gs);
        assert_eq!(det.frame().sum(), 12.);
    }
}
