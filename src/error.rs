#[derive(Debug, thiserror::Error)]
pub enum CeoPyramidError {
    #[error("pyramid wavefront sensor failure")]
    Pyramid(#[from] crate::PyramidError),
    #[error("cannot build `::ceo_pyramid::PyramidWfs`")]
    Builder(#[from] crate::wavefrontsensor::pyramid::BuilderError),
    #[error("cannot load or save the pyramid calibration data")]
    DataRef(#[from] crate::wavefrontsensor::data_processing::DataRefError),
    #[error("phase screen artifact failure")]
    PhaseScreen(#[from] crate::atmosphere::PhaseScreenError),
}
