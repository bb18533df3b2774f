use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::wavefrontsensor::pyramid::{PupilRegistration, PyramidError};

use super::Slopes;

type Mat = nalgebra::DMatrix<f32>;

#[derive(Debug, thiserror::Error)]
pub enum DataRefError {
    #[error("cannot create pickle file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot open pickle file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("pickle (de)serialization of `::ceo_pyramid::DataRef` failed")]
    Pickle(#[from] serde_pickle::Error),
}

/// Pyramid calibration data
///
/// Holds the pupil registration applied to the detector frame and
/// the reference slopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRef {
    pub(crate) registration: PupilRegistration,
    pub(crate) sxy0: Slopes,
}
impl DataRef {
    pub fn new(registration: PupilRegistration, sxy0: Slopes) -> Self {
        assert_eq!(
            registration.n_valid_subapertures(),
            sxy0.len(),
            "reference slopes do not match the pupil registration"
        );
        Self { registration, sxy0 }
    }
    /// Checks the consistency of the pupil registration and of the reference slopes
    ///
    /// Calibration data loaded from a file is not validated on deserialization
    pub fn validate(&self) -> Result<(), PyramidError> {
        self.registration.validate()?;
        let n_valid = self.registration.n_valid_subapertures();
        let reference = (self.sxy0.sx.len(), self.sxy0.sy.len());
        if reference != (n_valid, n_valid) {
            return Err(PyramidError::ReferenceMismatch { n_valid, reference });
        }
        Ok(())
    }
    /// Returns the pupil registration
    pub fn registration(&self) -> &PupilRegistration {
        &self.registration
    }
    /// Returns the reference slopes
    pub fn reference(&self) -> &Slopes {
        &self.sxy0
    }
    /// Maps sub-aperture values into the lower-left quadrant of the detector
    ///
    /// The values are written at the location of the pixels of the first pupil mask,
    /// the other pixels are set to zero
    pub fn to_quadrant(&self, values: &[f32]) -> Mat {
        let mask = &self.registration.masks()[0];
        let (nx, ny) = mask.resolution();
        let frame = Mat::from_row_slice(nx, ny, &mask.scatter(values));
        frame.view((0, 0), (nx / 2, ny / 2)).into_owned()
    }
    /// Saves the calibration data into a pickle file
    pub fn to_pickle<P: AsRef<Path>>(&self, path: P) -> Result<(), DataRefError> {
        let file = File::create(&path)
            .map_err(|e| DataRefError::Create(e, path.as_ref().to_path_buf()))?;
        serde_pickle::to_writer(&mut BufWriter::new(file), self, Default::default())?;
        Ok(())
    }
    /// Loads the calibration data from a pickle file
    pub fn from_pickle<P: AsRef<Path>>(path: P) -> Result<Self, DataRefError> {
        let file =
            File::open(&path).map_err(|e| DataRefError::Open(e, path.as_ref().to_path_buf()))?;
        Ok(serde_pickle::from_reader(
            BufReader::new(file),
            Default::default(),
        )?)
    }
}
