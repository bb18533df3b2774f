use nalgebra::DMatrix;

use crate::{
    wavefrontsensor::{
        data_processing::{DataRef, Slopes},
        Frame, LensletArray, Modulation, WavefrontSensor,
    },
    PupilMask,
};

use super::{
    CalibrationParams, CalibrationState, Measurement, NormalizationMode, OutputFormat,
    PupilRegistration, PyramidError, Result,
};

/// Pyramid wavefront sensor
///
/// Wraps the detector and holds the pupil registration and the reference slopes
/// once calibrated.
/// ```no_run
/// # use ceo_pyramid::*;
/// # fn main() -> anyhow::Result<()> {
/// let mut gs = Frame::zeros((240, 240));
/// let mut pym = PyramidWfsBuilder::new()
///     .n_lenslet(30)
///     .modulation(2., 32)
///     .build(IdealDetector::new((240, 240)))?;
/// pym.calibrate(&mut gs)?;
/// pym.analyze(&mut gs)?;
/// let sxy = pym.measurement("vector")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PyramidWfs<W: WavefrontSensor> {
    detector: W,
    lenslet_array: LensletArray,
    throughput: f32,
    normalization: NormalizationMode,
    calibration: CalibrationParams,
    state: CalibrationState,
    data_ref: Option<DataRef>,
    measurement: Option<Slopes>,
}

impl<W: WavefrontSensor> PyramidWfs<W> {
    pub(super) fn new(
        detector: W,
        lenslet_array: LensletArray,
        throughput: f32,
        normalization: NormalizationMode,
        calibration: CalibrationParams,
    ) -> Self {
        Self {
            detector,
            lenslet_array,
            throughput,
            normalization,
            calibration,
            state: CalibrationState::Uncalibrated,
            data_ref: None,
            measurement: None,
        }
    }
    /// Calibrates the pyramid with the builder registration parameters
    pub fn calibrate(&mut self, src: &mut W::GuideStar) -> Result<&DataRef> {
        let params = self.calibration;
        self.calibrate_with(src, params)
    }
    /// Calibrates the pyramid
    ///
    /// The pupil registration is derived from a frame taken with the calibration
    /// modulation, then the reference slopes are measured with the operating modulation.
    /// On failure, the previous calibration, if any, is kept.
    pub fn calibrate_with(
        &mut self,
        src: &mut W::GuideStar,
        params: CalibrationParams,
    ) -> Result<&DataRef> {
        let state = self.state;
        self.state = CalibrationState::Calibrating;
        match self.register(src, &params) {
            Ok(data_ref) => {
                log::info!(
                    "pyramid calibrated with {} valid sub-apertures",
                    data_ref.registration().n_valid_subapertures()
                );
                self.measurement = Some(data_ref.reference().clone());
                self.state = CalibrationState::Calibrated;
                let data_ref: &DataRef = self.data_ref.insert(data_ref);
                Ok(data_ref)
            }
            Err(e) => {
                log::warn!("pyramid calibration failed: {e}");
                self.state = state;
                Err(e)
            }
        }
    }
    fn register(&mut self, src: &mut W::GuideStar, params: &CalibrationParams) -> Result<DataRef> {
        let modulation = self.detector.modulation();
        self.detector.reset();
        self.detector.set_modulation(params.modulation);
        self.detector.propagate(src);
        let frame = self.detector.frame().clone();
        self.detector.set_modulation(modulation);

        let registration = PupilRegistration::calibrate(
            &frame,
            self.lenslet_array.n_side_lenslet,
            params.extra_subapertures_percent,
            params.flux_threshold,
        )?;

        self.detector.reset();
        self.detector.propagate(src);
        let sxy0 = Slopes::from((&registration, self.detector.frame(), self.normalization));
        Ok(DataRef::new(registration, sxy0))
    }
    /// Sets the calibration from previously saved calibration data
    ///
    /// The calibration data is validated against the detector frame resolution
    pub fn with_data_ref(mut self, data_ref: DataRef) -> Result<Self> {
        data_ref.validate()?;
        let registration = data_ref.registration().resolution();
        let frame = self.detector.frame().resolution;
        if registration != frame {
            return Err(PyramidError::ResolutionMismatch {
                registration,
                frame,
            });
        }
        self.measurement = Some(data_ref.reference().clone());
        self.data_ref = Some(data_ref);
        self.state = CalibrationState::Calibrated;
        Ok(self)
    }
    /// Resets the detector, propagates the guide star and computes the slopes
    pub fn analyze(&mut self, src: &mut W::GuideStar) -> Result<()> {
        if self.data_ref.is_none() {
            return Err(PyramidError::Uncalibrated);
        }
        self.detector.reset();
        self.detector.propagate(src);
        self.process()
    }
    /// Computes the slopes from the current detector frame
    pub fn process(&mut self) -> Result<()> {
        let data_ref = self.data_ref.as_ref().ok_or(PyramidError::Uncalibrated)?;
        let registration = data_ref.registration();
        let frame = self.detector.frame();
        if frame.resolution != registration.resolution() {
            return Err(PyramidError::ResolutionMismatch {
                registration: registration.resolution(),
                frame: frame.resolution,
            });
        }
        self.measurement = Some(Slopes::from((registration, frame, self.normalization)));
        Ok(())
    }
    /// Returns the slopes minus the reference slopes
    pub fn data(&self) -> Result<Slopes> {
        let data_ref = self.data_ref.as_ref().ok_or(PyramidError::Uncalibrated)?;
        let measurement = self.measurement.as_ref().ok_or(PyramidError::Uncalibrated)?;
        Ok(measurement - data_ref.reference())
    }
    /// Returns the slopes minus the reference slopes either as `"vector"` or `"list"`
    pub fn measurement<F>(&self, format: F) -> Result<Measurement>
    where
        F: TryInto<OutputFormat>,
        PyramidError: From<<F as TryInto<OutputFormat>>::Error>,
    {
        let format: OutputFormat = format.try_into()?;
        Ok((self.data()?, format).into())
    }
    /// Returns the reference slopes either as `"vector"` or `"list"`
    pub fn reference_measurement<F>(&self, format: F) -> Result<Measurement>
    where
        F: TryInto<OutputFormat>,
        PyramidError: From<<F as TryInto<OutputFormat>>::Error>,
    {
        let format: OutputFormat = format.try_into()?;
        let data_ref = self.data_ref.as_ref().ok_or(PyramidError::Uncalibrated)?;
        Ok((data_ref.reference().clone(), format).into())
    }
    /// Returns the x slopes minus the reference
    pub fn sx(&self) -> Result<Vec<f32>> {
        Ok(self.data()?.into_pair().0)
    }
    /// Returns the y slopes minus the reference
    pub fn sy(&self) -> Result<Vec<f32>> {
        Ok(self.data()?.into_pair().1)
    }
    /// Returns the x slopes minus the reference mapped onto the lower-left detector quadrant
    pub fn sx2d(&self) -> Result<DMatrix<f32>> {
        let data_ref = self.data_ref.as_ref().ok_or(PyramidError::Uncalibrated)?;
        Ok(data_ref.to_quadrant(&self.sx()?))
    }
    /// Returns the y slopes minus the reference mapped onto the lower-left detector quadrant
    pub fn sy2d(&self) -> Result<DMatrix<f32>> {
        let data_ref = self.data_ref.as_ref().ok_or(PyramidError::Uncalibrated)?;
        Ok(data_ref.to_quadrant(&self.sy()?))
    }
    /// Returns the standard deviation of the x and y slopes minus the reference
    pub fn measurement_rms(&self) -> Result<(f64, f64)> {
        Ok(self.data()?.rms())
    }
    /// Returns the number of measurements, twice the number of valid sub-apertures
    pub fn measurement_size(&self) -> usize {
        2 * self.n_valid_subapertures()
    }
    /// Returns the number of valid sub-apertures, 0 if the pyramid is not calibrated
    pub fn n_valid_subapertures(&self) -> usize {
        self.pupil_registration()
            .map_or(0, PupilRegistration::n_valid_subapertures)
    }
    pub fn pupil_registration(&self) -> Option<&PupilRegistration> {
        self.data_ref.as_ref().map(DataRef::registration)
    }
    /// Returns the masks of the 4 pupil images
    pub fn pupil_masks(&self) -> Option<&[PupilMask; 4]> {
        self.pupil_registration().map(PupilRegistration::masks)
    }
    pub fn data_ref(&self) -> Option<&DataRef> {
        self.data_ref.as_ref()
    }
    /// Returns the detector frame
    pub fn frame(&self) -> &Frame {
        self.detector.frame()
    }
    /// Resets the detector frame
    pub fn reset(&mut self) {
        self.detector.reset();
    }
    pub fn state(&self) -> CalibrationState {
        self.state
    }
    pub fn is_calibrated(&self) -> bool {
        self.state == CalibrationState::Calibrated
    }
    /// Returns the operating modulation
    pub fn modulation(&self) -> Modulation {
        self.detector.modulation()
    }
    /// Sets the operating modulation amplitude (lambda/D) and sampling
    pub fn set_modulation(&mut self, amplitude: f32, sampling: usize) {
        self.detector
            .set_modulation(Modulation::new(amplitude, sampling));
    }
    pub fn throughput(&self) -> f32 {
        self.throughput
    }
    /// Sets the optical throughput, applied as the detector photoelectron gain
    pub fn set_throughput(&mut self, throughput: f32) {
        self.throughput = throughput;
        self.detector.set_photoelectron_gain(throughput);
    }
    pub fn signal_normalization(&self) -> NormalizationMode {
        self.normalization
    }
    /// Sets the slopes normalization from a [NormalizationMode] or its name
    ///
    /// The reference slopes are not updated: the pyramid must be calibrated again
    /// for the new normalization
    pub fn set_signal_normalization<N>(&mut self, normalization: N) -> Result<()>
    where
        N: TryInto<NormalizationMode>,
        PyramidError: From<<N as TryInto<NormalizationMode>>::Error>,
    {
        self.normalization = normalization.try_into()?;
        Ok(())
    }
    pub fn calibration_params(&self) -> &CalibrationParams {
        &self.calibration
    }
    pub fn lenslet_array(&self) -> &LensletArray {
        &self.lenslet_array
    }
    /// Returns the pupil sampling in pixels
    pub fn pupil_sampling(&self) -> usize {
        self.lenslet_array.pupil_sampling()
    }
    pub fn detector(&self) -> &W {
        &self.detector
    }
    pub fn detector_mut(&mut self) -> &mut W {
        &mut self.detector
    }
    pub fn into_detector(self) -> W {
        self.detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefrontsensor::{pyramid::PyramidWfsBuilder, IdealDetector, ModulatedSource};

    fn pupils(amplitude: f32) -> Frame {
        let centers = [(16., 16.), (16., 48.), (48., 16.), (48., 48.)];
        Frame::from_fn((64, 64), |x, y| {
            if centers
                .iter()
                .any(|(cx, cy)| (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) <= 16.)
            {
                amplitude
            } else {
                0f32
            }
        })
    }

    #[test]
    fn uncalibrated() {
        let mut gs = pupils(1.);
        let mut pym = PyramidWfsBuilder::new()
            .n_lenslet(8)
            .build(IdealDetector::new((64, 64)))
            .unwrap();
        assert_eq!(pym.state(), CalibrationState::Uncalibrated);
        assert!(matches!(pym.analyze(&mut gs), Err(PyramidError::Uncalibrated)));
        assert!(matches!(pym.process(), Err(PyramidError::Uncalibrated)));
        assert!(matches!(
            pym.measurement("vector"),
            Err(PyramidError::Uncalibrated)
        ));
        assert_eq!(pym.measurement_size(), 0);
    }

    #[test]
    fn calibrate() {
        let mut gs = pupils(1.);
        let mut pym = PyramidWfsBuilder::new()
            .n_lenslet(8)
            .build(IdealDetector::new((64, 64)))
            .unwrap();
        pym.calibrate(&mut gs).unwrap();
        assert!(pym.is_calibrated());
        assert_eq!(pym.n_valid_subapertures(), 49);
        assert_eq!(pym.measurement_size(), 98);
        assert_eq!(pym.measurement("vector").unwrap().into_vec(), vec![0f32; 98]);
        assert!(pym.sx2d().unwrap().iter().all(|v| *v == 0f32));
    }

    #[test]
    fn failed_calibration() {
        let mut pym = PyramidWfsBuilder::new()
            .n_lenslet(8)
            .build(IdealDetector::new((64, 64)))
            .unwrap();
        let mut gs = Frame::zeros((64, 64));
        assert!(matches!(
            pym.calibrate(&mut gs),
            Err(PyramidError::ZeroFlux)
        ));
        assert_eq!(pym.state(), CalibrationState::Uncalibrated);
        assert!(pym.data_ref().is_none());
    }

    #[test]
    fn calibration_modulation() {
        let mut pym = PyramidWfsBuilder::new()
            .n_lenslet(8)
            .modulation(1., 8)
            .build(IdealDetector::new((64, 64)))
            .unwrap();
        let modulations = std::cell::RefCell::new(vec![]);
        let mut gs = ModulatedSource(|m: Modulation| {
            modulations.borrow_mut().push(m);
            pupils(1.)
        });
        let params = CalibrationParams::default().modulation(5., 40);
        pym.calibrate_with(&mut gs, params).unwrap();
        assert_eq!(pym.modulation(), Modulation::new(1., 8));
        assert_eq!(
            *modulations.borrow(),
            vec![Modulation::new(5., 40), Modulation::new(1., 8)]
        );
    }

    #[test]
    fn normalization() {
        let mut pym = PyramidWfsBuilder::new()
            .n_lenslet(8)
            .build(IdealDetector::<Frame>::new((64, 64)))
            .unwrap();
        pym.set_signal_normalization("QUADCELL").unwrap();
        assert_eq!(pym.signal_normalization(), NormalizationMode::QuadCell);
        assert!(matches!(
            pym.set_signal_normalization("QUAD_CELL"),
            Err(PyramidError::InvalidNormalizationMode(_))
        ));
        assert_eq!(pym.signal_normalization(), NormalizationMode::QuadCell);
        pym.set_signal_normalization(NormalizationMode::MeanFluxPerSubap)
            .unwrap();
        assert_eq!(
            pym.signal_normalization(),
            NormalizationMode::MeanFluxPerSubap
        );
    }
}
