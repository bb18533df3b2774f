mod mask;
pub use mask::PupilMask;
