//! Phase screen artifacts
//!
//! A phase screen is a binary data file generated by the CEO atmosphere model and a JSON
//! file with the parameters of the model, both sharing the same file stem.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use skyangle::Conversion;

use super::{PhaseScreenError, Result};

/// Phase screen parameters
///
/// Default properties:
///  - r0: 15cm
///  - L0: 25m
///  - L: 26m
///  - NXY_PUPIL: 346
///  - fov: 20arcmin
///  - duration: 15s
///  - N_DURATION: 20
///  - SEED: 1234
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseScreenMetadata {
    /// Fried parameter [m]
    pub r0: f64,
    /// Outer scale [m]
    #[serde(rename = "L0")]
    pub l0: f64,
    /// Phase screen size [m]
    #[serde(rename = "L")]
    pub length: f64,
    /// Phase screen sampling
    #[serde(rename = "NXY_PUPIL")]
    pub nxy_pupil: usize,
    /// Field of view [rd]
    pub fov: f64,
    /// Phase screen time length [s]
    pub duration: f64,
    /// Number of time series of `duration` length
    #[serde(rename = "N_DURATION")]
    pub n_duration: usize,
    /// Phase screen data file
    pub filename: String,
    /// Random generator seed
    #[serde(rename = "SEED")]
    pub seed: u64,
}
impl Default for PhaseScreenMetadata {
    fn default() -> Self {
        let (l0, seed) = (25f64, 1234);
        Self {
            r0: 0.15,
            l0,
            length: 26.,
            nxy_pupil: 346,
            fov: 20f64.from_arcmin(),
            duration: 15.,
            n_duration: 20,
            filename: format!("{}.bin", file_stem(l0, seed)),
            seed,
        }
    }
}

/// Phase screen file stem `gmtAtmosphereL0<L0>_<SEED>`
pub fn file_stem(l0: f64, seed: u64) -> String {
    format!("gmtAtmosphereL0{}_{}", l0.trunc() as i64, seed)
}

impl PhaseScreenMetadata {
    /// Creates the phase screen metadata with the data file in `directory`
    pub fn new<P: AsRef<Path>>(directory: P, l0: f64, seed: u64) -> Self {
        Self {
            l0,
            seed,
            ..Default::default()
        }
        .directory(directory)
    }
    /// Sets the directory of the data file, the file name follows the outer scale and the seed
    pub fn directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.filename = directory
            .as_ref()
            .join(format!("{}.bin", file_stem(self.l0, self.seed)))
            .to_string_lossy()
            .into_owned();
        self
    }
    /// Sets the field of view in arcminute
    pub fn fov_arcmin(mut self, fov: f64) -> Self {
        self.fov = fov.from_arcmin();
        self
    }
    /// Returns the path to the phase screen data file
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.filename)
    }
    /// Returns the path to the phase screen metadata file
    pub fn metadata_path(&self) -> PathBuf {
        self.data_path().with_extension("json")
    }
    /// Returns the metadata and data file paths
    pub fn artifact_paths(&self) -> [PathBuf; 2] {
        [self.metadata_path(), self.data_path()]
    }
    /// Loads the metadata from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| PhaseScreenError::Open(e, path.as_ref().to_path_buf()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
    /// Saves the metadata into a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(&path)
            .map_err(|e| PhaseScreenError::Create(e, path.as_ref().to_path_buf()))?;
        let mut writer = BufWriter::new(file);
        let mut ser =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser)?;
        writer
            .flush()
            .map_err(|e| PhaseScreenError::Create(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Saves the metadata next to the data file and returns its path
    pub fn write(&self) -> Result<PathBuf> {
        let path = self.metadata_path();
        self.save(&path)?;
        log::info!(
            "phase screen metadata ({:.1}arcmin field of view) written to {}",
            self.fov.to_arcmin(),
            path.display()
        );
        Ok(path)
    }
}

/// Phase screens parameter sweep
///
/// One phase screen per random generator seed, all with the same parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseScreenSweep {
    pub directory: PathBuf,
    pub seeds: Vec<u64>,
    pub parameters: PhaseScreenMetadata,
}
impl Default for PhaseScreenSweep {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/mnt/bins"),
            seeds: vec![1234],
            parameters: Default::default(),
        }
    }
}
impl PhaseScreenSweep {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
    /// Sets the random generator seeds
    pub fn seeds(mut self, seeds: Vec<u64>) -> Self {
        self.seeds = seeds;
        self
    }
    /// Sets the phase screen parameters common to all the seeds
    pub fn parameters(mut self, parameters: PhaseScreenMetadata) -> Self {
        self.parameters = parameters;
        self
    }
    /// Returns an iterator over the metadata of the sweep phase screens
    pub fn iter(&self) -> impl Iterator<Item = PhaseScreenMetadata> + '_ {
        self.seeds.iter().map(|&seed| {
            PhaseScreenMetadata {
                seed,
                ..self.parameters.clone()
            }
            .directory(&self.directory)
        })
    }
    /// Writes the metadata files of the sweep and returns their paths
    pub fn write(&self) -> Result<Vec<PathBuf>> {
        self.iter().map(|metadata| metadata.write()).collect()
    }
}
