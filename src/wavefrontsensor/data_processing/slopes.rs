use std::ops::Sub;

use serde::{Deserialize, Serialize};

use crate::wavefrontsensor::{
    pyramid::{NormalizationMode, PupilRegistration},
    Frame,
};

/// Pyramid measurements
///
/// The x and y slopes of the valid sub-apertures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slopes {
    pub(crate) sx: Vec<f32>,
    pub(crate) sy: Vec<f32>,
}
impl Slopes {
    /// Creates the measurements from the x and y slopes
    pub fn new(sx: Vec<f32>, sy: Vec<f32>) -> Self {
        assert_eq!(sx.len(), sy.len(), "sx and sy must have the same length");
        Self { sx, sy }
    }
    /// Creates null measurements for `n` sub-apertures
    pub fn zeros(n: usize) -> Self {
        Self {
            sx: vec![0f32; n],
            sy: vec![0f32; n],
        }
    }
    /// Returns the number of sub-apertures
    pub fn len(&self) -> usize {
        self.sx.len()
    }
    /// Checks if there is no sub-aperture
    pub fn is_empty(&self) -> bool {
        self.sx.is_empty()
    }
    /// Returns the x slopes
    pub fn sx(&self) -> &[f32] {
        &self.sx
    }
    /// Returns the y slopes
    pub fn sy(&self) -> &[f32] {
        &self.sy
    }
    /// Returns the measurements vector `[sx,sy]`
    pub fn to_vec(&self) -> Vec<f32> {
        self.sx.iter().chain(&self.sy).cloned().collect()
    }
    /// Returns the x and y slopes
    pub fn into_pair(self) -> (Vec<f32>, Vec<f32>) {
        (self.sx, self.sy)
    }
    /// Returns the standard deviation of the x and y slopes
    pub fn rms(&self) -> (f64, f64) {
        (std(&self.sx), std(&self.sy))
    }
}

fn std(data: &[f32]) -> f64 {
    if data.is_empty() {
        return 0f64;
    }
    let n = data.len() as f64;
    let mean = data.iter().map(|x| *x as f64).sum::<f64>() / n;
    (data
        .iter()
        .map(|x| (*x as f64 - mean).powi(2))
        .sum::<f64>()
        / n)
        .sqrt()
}

type V = nalgebra::DVector<f32>;
impl From<Slopes> for V {
    /// Converts the pyramid measurements into a [nalgebra] vector `[sx,sy]`
    fn from(value: Slopes) -> Self {
        V::from_vec(value.to_vec())
    }
}

impl From<(&PupilRegistration, &Frame, NormalizationMode)> for Slopes {
    /// Computes the pyramid measurements
    ///
    /// The slopes are the flux differences between the pupil images at each sub-aperture
    /// normalized according to [NormalizationMode].
    /// A frame without photons gives null slopes and so does, with [NormalizationMode::QuadCell],
    /// a sub-aperture without photons.
    fn from(
        (registration, frame, normalization): (&PupilRegistration, &Frame, NormalizationMode),
    ) -> Self {
        let n = registration.n_valid_subapertures();
        let [q0, q1, q2, q3] = registration
            .masks()
            .each_ref()
            .map(|mask| mask.gather(&frame.value).map(f64::from).collect::<Vec<_>>());
        let flux: Vec<f64> = (0..n).map(|i| q0[i] + q1[i] + q2[i] + q3[i]).collect();
        let total_flux: f64 = flux.iter().sum();
        if total_flux == 0f64 {
            log::debug!("no photons on the pyramid detector, slopes are set to zero");
            return Slopes::zeros(n);
        }
        log::debug!("pyramid detector flux: {total_flux:e}");

        let mean_flux = total_flux / n as f64;
        let (sx, sy): (Vec<f32>, Vec<f32>) = (0..n)
            .map(|i| {
                let norm = match normalization {
                    NormalizationMode::QuadCell => flux[i],
                    NormalizationMode::MeanFluxPerSubap => mean_flux,
                };
                if norm == 0f64 {
                    return (0f32, 0f32);
                }
                let sx = (q3[i] + q2[i] - q1[i] - q0[i]) / norm;
                let sy = (q1[i] + q3[i] - q0[i] - q2[i]) / norm;
                (sx as f32, sy as f32)
            })
            .unzip();
        Slopes { sx, sy }
    }
}

impl Sub for Slopes {
    type Output = Slopes;

    fn sub(self, rhs: Self) -> Self::Output {
        &self - &rhs
    }
}
impl Sub for &Slopes {
    type Output = Slopes;

    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.len(), rhs.len(), "slopes length mismatch");
        let diff = |a: &[f32], b: &[f32]| -> Vec<f32> {
            a.iter().zip(b).map(|(a, b)| a - b).collect()
        };
        Slopes {
            sx: diff(&self.sx, &rhs.sx),
            sy: diff(&self.sy, &rhs.sy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PupilMask;

    // 4x4 frame with one pixel per pupil image
    fn registration() -> PupilRegistration {
        let masks = [(0, 0), (0, 3), (3, 0), (3, 3)]
            .map(|(x, y)| PupilMask::disc((4, 4), (x as f64, y as f64), 0.));
        PupilRegistration::new(masks, [(0., 0.), (0., 3.), (3., 0.), (3., 3.)]).unwrap()
    }

    #[test]
    fn zero_flux() {
        let slopes = Slopes::from((
            &registration(),
            &Frame::zeros((4, 4)),
            NormalizationMode::QuadCell,
        ));
        assert_eq!(slopes, Slopes::zeros(1));
    }

    #[test]
    fn quad_cell() {
        let mut frame = Frame::zeros((4, 4));
        frame.value[0] = 1.;
        frame.value[3] = 2.;
        frame.value[12] = 3.;
        frame.value[15] = 4.;
        let slopes = Slopes::from((&registration(), &frame, NormalizationMode::QuadCell));
        assert_eq!(slopes.sx(), &[(4. + 3. - 2. - 1.) / 10.]);
        assert_eq!(slopes.sy(), &[(2. + 4. - 1. - 3.) / 10.]);
    }

    #[test]
    fn rms() {
        let slopes = Slopes::new(vec![1., -1., 1., -1.], vec![2., 2., 2., 2.]);
        assert_eq!(slopes.rms(), (1., 0.));
        let diff = &slopes - &slopes;
        assert_eq!(diff.to_vec(), vec![0f32; 8]);
    }
}
