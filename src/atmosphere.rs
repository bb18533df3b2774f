//!
//! # Atmospheric turbulence
//!
//! von Karman phase statistics and the description of the phase screens
//! generated offline for the adaptive optics simulations.

use std::path::PathBuf;

pub mod phase_screen;
pub mod phase_stats;
pub use phase_screen::{PhaseScreenMetadata, PhaseScreenSweep};
pub use phase_stats::TurbulenceStatistics;

#[derive(Debug, thiserror::Error)]
pub enum PhaseScreenError {
    #[error("cannot open phase screen metadata file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create phase screen metadata file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("phase screen metadata (de)serialization failed")]
    Json(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, PhaseScreenError>;
