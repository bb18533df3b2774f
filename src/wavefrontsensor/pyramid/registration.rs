use std::{cmp::Ordering, fmt::Display};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{PyramidError, Result};
use crate::{wavefrontsensor::Frame, PupilMask};

/// Detector quadrants
///
/// The quadrant value is the index of the pupil image mask in [PupilRegistration]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    LowerLeft = 0,
    LowerRight = 1,
    UpperLeft = 2,
    UpperRight = 3,
}
impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::LowerLeft,
        Quadrant::LowerRight,
        Quadrant::UpperLeft,
        Quadrant::UpperRight,
    ];
    /// Returns the quadrant the pixel `(x,y)` belongs to
    ///
    /// Pixels on the center lines `x=nx/2` or `y=ny/2` belong to none
    pub fn locate(x: usize, y: usize, resolution: (usize, usize)) -> Option<Self> {
        let (nx, ny) = resolution;
        match ((2 * x).cmp(&nx), (2 * y).cmp(&ny)) {
            (Ordering::Less, Ordering::Less) => Some(Quadrant::LowerLeft),
            (Ordering::Less, Ordering::Greater) => Some(Quadrant::LowerRight),
            (Ordering::Greater, Ordering::Less) => Some(Quadrant::UpperLeft),
            (Ordering::Greater, Ordering::Greater) => Some(Quadrant::UpperRight),
            _ => None,
        }
    }
}
impl Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quadrant::LowerLeft => f.write_str("lower-left"),
            Quadrant::LowerRight => f.write_str("lower-right"),
            Quadrant::UpperLeft => f.write_str("upper-left"),
            Quadrant::UpperRight => f.write_str("upper-right"),
        }
    }
}

/// Sub-aperture diameter in pixels
///
/// The number of lenslets across the pupil plus the extra percentage of it,
/// rounded half to even
pub fn subaperture_diameter(n_side_lenslet: usize, extra_subapertures_percent: f64) -> usize {
    let n = n_side_lenslet as f64;
    (n + (n * extra_subapertures_percent / 100f64).round_ties_even()).max(0f64) as usize
}

/// Pupil registration
///
/// The masks of the 4 pupil images on the detector, indexed by [Quadrant].
/// All the masks have the same number of active pixels, the valid sub-apertures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PupilRegistration {
    masks: [PupilMask; 4],
    centers: [(f64, f64); 4],
    n_valid: usize,
}
impl PupilRegistration {
    /// Creates a pupil registration from the 4 pupil masks and the pupil image centers
    pub fn new(masks: [PupilMask; 4], centers: [(f64, f64); 4]) -> Result<Self> {
        let registration = Self {
            n_valid: masks[0].nnz(),
            masks,
            centers,
        };
        registration.validate()?;
        Ok(registration)
    }
    /// Checks that the 4 masks select valid pixels of frames of the same resolution
    /// and have all the same number of active pixels
    pub fn validate(&self) -> Result<()> {
        let resolution = self.resolution();
        for (q, mask) in Quadrant::ALL.into_iter().zip(&self.masks) {
            if mask.resolution() != resolution || !mask.is_valid() {
                log::warn!("invalid {q} pupil mask");
                return Err(PyramidError::InvalidPupilMask(q));
            }
        }
        let counts = self.masks.each_ref().map(PupilMask::nnz);
        if counts.iter().any(|&c| c != self.n_valid) {
            log::warn!("pupil masks mismatch: {counts:?}");
            return Err(PyramidError::RegistrationMismatch(counts));
        }
        Ok(())
    }
    /// Registers the pupil images of a calibration frame
    ///
    /// The centroid of each quadrant sets the center of a disc mask of radius half the
    /// [subaperture_diameter]. If `flux_threshold` is positive, only the sub-apertures
    /// with a flux larger than `flux_threshold` times the mean sub-aperture flux are kept.
    pub fn calibrate(
        frame: &Frame,
        n_side_lenslet: usize,
        extra_subapertures_percent: f64,
        flux_threshold: f64,
    ) -> Result<Self> {
        if !frame.is_quadrant_split() {
            return Err(PyramidError::FrameShape(frame.resolution));
        }
        if frame.sum() <= 0f64 {
            log::warn!("pyramid calibration frame without photons");
            return Err(PyramidError::ZeroFlux);
        }
        let centers = centroids(frame)?;
        log::info!("pupil images centers: {centers:.2?}");

        let n_sub = subaperture_diameter(n_side_lenslet, extra_subapertures_percent);
        let radius = (n_sub as f64 * 0.5).round_ties_even();
        log::info!("sub-aperture diameter: {n_sub}px (mask radius: {radius}px)");

        let mut masks: [PupilMask; 4] = Default::default();
        masks
            .as_mut_slice()
            .par_iter_mut()
            .zip(centers.as_slice().par_iter())
            .for_each(|(mask, &center)| {
                *mask = PupilMask::disc(frame.resolution, center, radius);
            });
        let mut registration = Self::new(masks, centers)?;

        if flux_threshold > 0f64 {
            registration.refine(frame, flux_threshold)?;
        }
        log::info!(
            "valid sub-apertures: {}",
            registration.n_valid_subapertures()
        );
        Ok(registration)
    }
    /// Removes the sub-apertures with a flux lower or equal to `flux_threshold` times the mean flux
    fn refine(&mut self, frame: &Frame, flux_threshold: f64) -> Result<()> {
        let flux = self.subaperture_flux(frame);
        let mean_flux = flux.iter().sum::<f64>() / flux.len().max(1) as f64;
        let keep: Vec<bool> = flux.iter().map(|&f| f > mean_flux * flux_threshold).collect();
        self.masks.iter_mut().for_each(|mask| mask.retain(&keep));
        self.n_valid = self.masks[0].nnz();
        log::debug!(
            "flux threshold {flux_threshold}: {} sub-apertures discarded",
            keep.len() - self.n_valid
        );
        if self.n_valid == 0 {
            return Err(PyramidError::NoValidSubaperture(flux_threshold));
        }
        Ok(())
    }
    /// Returns the flux of each sub-aperture summed over the 4 pupil images
    pub fn subaperture_flux(&self, frame: &Frame) -> Vec<f64> {
        let mut flux = vec![0f64; self.n_valid];
        for mask in &self.masks {
            flux.iter_mut()
                .zip(mask.gather(&frame.value))
                .for_each(|(f, v)| *f += v as f64);
        }
        flux
    }
    /// Returns the 4 pupil masks
    pub fn masks(&self) -> &[PupilMask; 4] {
        &self.masks
    }
    /// Returns the pupil mask of a quadrant
    pub fn mask(&self, quadrant: Quadrant) -> &PupilMask {
        &self.masks[quadrant as usize]
    }
    /// Returns the centers `(x,y)` of the 4 pupil images
    pub fn centers(&self) -> &[(f64, f64); 4] {
        &self.centers
    }
    /// Returns the number of valid sub-apertures
    pub fn n_valid_subapertures(&self) -> usize {
        self.n_valid
    }
    /// Returns the detector frame resolution of the masks
    pub fn resolution(&self) -> (usize, usize) {
        self.masks[0].resolution()
    }
}

// Intensity weighted centroid of each quadrant
fn centroids(frame: &Frame) -> Result<[(f64, f64); 4]> {
    let (_, ny) = frame.resolution;
    let mut moments = [(0f64, 0f64, 0f64); 4];
    for (i, &v) in frame.value.iter().enumerate() {
        let (x, y) = (i / ny, i % ny);
        if let Some(q) = Quadrant::locate(x, y, frame.resolution) {
            let v = v as f64;
            let (w, wx, wy) = &mut moments[q as usize];
            *w += v;
            *wx += v * x as f64;
            *wy += v * y as f64;
        }
    }
    let mut centers = [(0f64, 0f64); 4];
    for (q, (w, wx, wy)) in Quadrant::ALL.into_iter().zip(moments) {
        if w <= 0f64 {
            log::warn!("no photons in the {q} pupil image");
            return Err(PyramidError::ZeroFluxQuadrant(q));
        }
        centers[q as usize] = (wx / w, wy / w);
    }
    Ok(centers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discs(n: usize, centers: &[(f64, f64)], radius: f64) -> Frame {
        Frame::from_fn((n, n), |x, y| {
            if centers.iter().any(|(cx, cy)| {
                (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) <= radius * radius
            }) {
                1f32
            } else {
                0f32
            }
        })
    }

    const CENTERS: [(f64, f64); 4] = [(16., 16.), (16., 48.), (48., 16.), (48., 48.)];

    #[test]
    fn quadrants() {
        assert_eq!(Quadrant::locate(0, 0, (8, 8)), Some(Quadrant::LowerLeft));
        assert_eq!(Quadrant::locate(3, 5, (8, 8)), Some(Quadrant::LowerRight));
        assert_eq!(Quadrant::locate(5, 3, (8, 8)), Some(Quadrant::UpperLeft));
        assert_eq!(Quadrant::locate(7, 7, (8, 8)), Some(Quadrant::UpperRight));
        assert_eq!(Quadrant::locate(4, 1, (8, 8)), None);
        assert_eq!(Quadrant::locate(1, 4, (8, 8)), None);
    }

    #[test]
    fn diameter() {
        assert_eq!(subaperture_diameter(8, 0.), 8);
        assert_eq!(subaperture_diameter(8, 25.), 10);
        assert_eq!(subaperture_diameter(30, 5.), 32);
        // 2.5 rounds to 2
        assert_eq!(subaperture_diameter(10, 25.), 12);
    }

    #[test]
    fn centers() {
        let frame = discs(64, &CENTERS, 4.);
        let registration = PupilRegistration::calibrate(&frame, 8, 0., 0.).unwrap();
        assert_eq!(registration.centers(), &CENTERS);
        assert_eq!(registration.n_valid_subapertures(), 49);
        assert!(registration.mask(Quadrant::LowerRight).contains(16, 48));
        assert!(registration.mask(Quadrant::UpperLeft).contains(48, 16));
        assert_eq!(registration.subaperture_flux(&frame), vec![4f64; 49]);
    }

    #[test]
    fn mismatch() {
        let mut centers = CENTERS.to_vec();
        centers.push((16., 17.));
        let frame = discs(64, &centers, 0.);
        let err = PupilRegistration::calibrate(&frame, 8, 0., 0.).unwrap_err();
        assert!(matches!(
            err,
            PyramidError::RegistrationMismatch([48, 49, 49, 49])
        ));
    }

    #[test]
    fn invalid_masks() {
        let masks = CENTERS.map(|c| PupilMask::disc((64, 64), c, 4.));
        assert!(PupilRegistration::new(masks.clone(), CENTERS).is_ok());

        let mut unsorted = masks.clone();
        unsorted[1].index.swap(0, 1);
        assert!(matches!(
            PupilRegistration::new(unsorted, CENTERS),
            Err(PyramidError::InvalidPupilMask(Quadrant::LowerRight))
        ));

        let mut outside = masks.clone();
        *outside[2].index.last_mut().unwrap() = 64 * 64;
        assert!(matches!(
            PupilRegistration::new(outside, CENTERS),
            Err(PyramidError::InvalidPupilMask(Quadrant::UpperLeft))
        ));

        let mut resized = masks.clone();
        resized[3].resolution = (32, 32);
        assert!(matches!(
            PupilRegistration::new(resized, CENTERS),
            Err(PyramidError::InvalidPupilMask(Quadrant::UpperRight))
        ));

        let mut missing = masks;
        missing[1].index.pop();
        assert!(matches!(
            PupilRegistration::new(missing, CENTERS),
            Err(PyramidError::RegistrationMismatch([49, 48, 49, 49]))
        ));
    }

    #[test]
    fn refine() {
        let frame = discs(64, &CENTERS, 4.);
        let registration = PupilRegistration::calibrate(&frame, 8, 25., 0.).unwrap();
        assert_eq!(registration.n_valid_subapertures(), 81);
        let registration = PupilRegistration::calibrate(&frame, 8, 25., 0.1).unwrap();
        assert_eq!(registration.n_valid_subapertures(), 49);
        assert!(registration
            .masks()
            .iter()
            .all(|mask| mask.nnz() == 49));
        let err = PupilRegistration::calibrate(&frame, 8, 0., 1.).unwrap_err();
        assert!(matches!(err, PyramidError::NoValidSubaperture(_)));
    }

    #[test]
    fn zero_flux() {
        let frame = Frame::zeros((64, 64));
        assert!(matches!(
            PupilRegistration::calibrate(&frame, 8, 0., 0.),
            Err(PyramidError::ZeroFlux)
        ));
        let frame = discs(64, &CENTERS[..3], 4.);
        assert!(matches!(
            PupilRegistration::calibrate(&frame, 8, 0., 0.),
            Err(PyramidError::ZeroFluxQuadrant(Quadrant::UpperRight))
        ));
        let frame = Frame::<f32>::zeros((63, 63));
        assert!(matches!(
            PupilRegistration::calibrate(&frame, 8, 0., 0.),
            Err(PyramidError::FrameShape((63, 63)))
        ));
    }
}
