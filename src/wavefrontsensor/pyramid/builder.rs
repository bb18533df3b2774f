use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::wavefrontsensor::{LensletArray, Modulation, WavefrontSensor};

use super::{CalibrationParams, NormalizationMode, PyramidError, PyramidWfs};

#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("cannot open `::ceo_pyramid::PyramidWfsBuilder` toml file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create `::ceo_pyramid::PyramidWfsBuilder` toml file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read `::ceo_pyramid::PyramidWfsBuilder` toml file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write `::ceo_pyramid::PyramidWfsBuilder` toml file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize `::ceo_pyramid::PyramidWfsBuilder` from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize `::ceo_pyramid::PyramidWfsBuilder` into toml")]
    Save(#[from] toml::ser::Error),
    #[error("invalid lenslet array: {0:?}")]
    LensletArray(LensletArray),
    #[error("the throughput must be positive, found {0}")]
    Throughput(f32),
    #[error("invalid detector")]
    Detector(#[from] PyramidError),
}
type Result<T> = std::result::Result<T, BuilderError>;

/// [PyramidWfs] builder
///
/// Default properties:
///   - n_lenslet: 30
///   - n_px_lenslet: 8px
///   - no modulation
///   - throughput: 1
///   - normalization: MEAN_FLUX_PER_SUBAP
///   - calibration: see [CalibrationParams]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidWfsBuilder {
    pub lenslet_array: LensletArray,
    modulation: Option<Modulation>,
    throughput: f32,
    normalization: NormalizationMode,
    calibration: CalibrationParams,
}
impl Default for PyramidWfsBuilder {
    fn default() -> Self {
        Self {
            lenslet_array: LensletArray::default(),
            modulation: None::<Modulation>,
            throughput: 1f32,
            normalization: NormalizationMode::default(),
            calibration: CalibrationParams::default(),
        }
    }
}

impl PyramidWfsBuilder {
    pub fn new() -> Self {
        Default::default()
    }
    /// Loads the pyramid builder from a toml file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file =
            File::open(&path).map_err(|e| BuilderError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| BuilderError::Read(e, path.as_ref().to_path_buf()))?;
        let builder: PyramidWfsBuilder = toml::from_str(&toml)?;
        Ok(builder)
    }
    /// Saves the pyramid builder into a toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| BuilderError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::ceo_pyramid::PyramidWfsBuilder\n\n{}", toml)
            .map_err(|e| BuilderError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Sets the number of equivalent lenslets
    pub fn n_lenslet(mut self, n_lenslet: usize) -> Self {
        self.lenslet_array.n_side_lenslet = n_lenslet;
        self
    }
    /// Sets the equivalent lenslet array
    pub fn lenslet_array(mut self, lenslet_array: LensletArray) -> Self {
        self.lenslet_array = lenslet_array;
        self
    }
    /// Sets the modulation amplitude and sampling
    ///
    /// The amplitude is given in units of lambda/d
    pub fn modulation(mut self, amplitude: f32, sampling: usize) -> Self {
        self.modulation = Some(Modulation {
            amplitude,
            sampling,
        });
        self
    }
    /// Sets the optical throughput, applied as the detector photoelectron gain
    pub fn throughput(mut self, throughput: f32) -> Self {
        self.throughput = throughput;
        self
    }
    /// Sets the slopes normalization
    pub fn normalization(mut self, normalization: NormalizationMode) -> Self {
        self.normalization = normalization;
        self
    }
    /// Sets the default pupil registration parameters
    pub fn calibration(mut self, calibration: CalibrationParams) -> Self {
        self.calibration = calibration;
        self
    }
    /// Returns the pupil sampling in pixels
    pub fn pupil_sampling(&self) -> usize {
        self.lenslet_array.pupil_sampling()
    }
    /// Builds the pyramid around the given detector
    ///
    /// The detector modulation and photoelectron gain are set to the builder values
    pub fn build<W: WavefrontSensor>(self, mut detector: W) -> Result<PyramidWfs<W>> {
        let LensletArray {
            n_side_lenslet,
            n_px_lenslet,
        } = self.lenslet_array;
        if n_side_lenslet == 0 || n_px_lenslet == 0 {
            return Err(BuilderError::LensletArray(self.lenslet_array));
        }
        if !(self.throughput > 0f32 && self.throughput.is_finite()) {
            return Err(BuilderError::Throughput(self.throughput));
        }
        let frame = detector.frame();
        if !frame.is_quadrant_split() {
            return Err(PyramidError::FrameShape(frame.resolution).into());
        }
        let modulation = self.modulation.unwrap_or_default();
        detector.set_modulation(modulation);
        detector.set_photoelectron_gain(self.throughput);
        log::info!(
            "pyramid with {n_side_lenslet} lenslets across the pupil, \
             {n_px_lenslet}px per lenslet and {:.1} lambda/D modulation",
            modulation.amplitude
        );
        Ok(PyramidWfs::new(
            detector,
            self.lenslet_array,
            self.throughput,
            self.normalization,
            self.calibration,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefrontsensor::{Frame, IdealDetector};

    #[test]
    fn toml() {
        let builder = PyramidWfsBuilder::new()
            .n_lenslet(12)
            .modulation(2., 16)
            .throughput(0.5)
            .normalization(NormalizationMode::QuadCell)
            .calibration(CalibrationParams::default().flux_threshold(0.25));
        let path = std::env::temp_dir().join("ceo-pyramid_builder.toml");
        builder.save(&path).unwrap();
        let toml = std::fs::read_to_string(&path).unwrap();
        assert!(toml.starts_with("# ::ceo_pyramid::PyramidWfsBuilder"));
        assert!(toml.contains(r#"normalization = "QUADCELL""#));
        let loaded = PyramidWfsBuilder::load(&path).unwrap();
        assert_eq!(loaded, builder);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_toml() {
        let err = PyramidWfsBuilder::load("ceo-pyramid_no-such-builder.toml").unwrap_err();
        assert!(matches!(err, BuilderError::Open(..)));
    }

    #[test]
    fn build() {
        let pym = PyramidWfsBuilder::new()
            .n_lenslet(8)
            .modulation(3., 24)
            .throughput(2.)
            .build(IdealDetector::<Frame>::new((64, 64)))
            .unwrap();
        assert_eq!(pym.modulation(), Modulation::new(3., 24));
        assert_eq!(pym.detector().photoelectron_gain(), 2.);
        assert_eq!(pym.pupil_sampling(), 64);
        assert!(!pym.is_calibrated());
    }

    #[test]
    fn invalid() {
        let detector = || IdealDetector::<Frame>::new((64, 64));
        assert!(matches!(
            PyramidWfsBuilder::new().n_lenslet(0).build(detector()),
            Err(BuilderError::LensletArray(_))
        ));
        assert!(matches!(
            PyramidWfsBuilder::new().throughput(0.).build(detector()),
            Err(BuilderError::Throughput(_))
        ));
        assert!(matches!(
            PyramidWfsBuilder::new().build(IdealDetector::<Frame>::new((64, 32))),
            Err(BuilderError::Detector(PyramidError::FrameShape((64, 32))))
        ));
    }
}
