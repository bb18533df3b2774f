mod slopes;
pub use slopes::Slopes;
mod data_ref;
pub use data_ref::{DataRef, DataRefError};
