#![allow(dead_code)]

use ceo_pyramid::Frame;

pub const N_PX: usize = 64;
pub const N_LENSLET: usize = 8;
/// Pupil images centers in the lower-left, lower-right, upper-left and upper-right quadrants
pub const CENTERS: [(f64, f64); 4] = [(16., 16.), (16., 48.), (48., 16.), (48., 48.)];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 64x64 frame with 4 pupil images of radius `radius` centered on [CENTERS]
///
/// The intensity of the pixel at `(dx,dy)` from the center of the pupil image `q` is `f(q,dx,dy)`
pub fn pupils<F>(radius: f64, f: F) -> Frame
where
    F: Fn(usize, f64, f64) -> f32,
{
    Frame::from_fn((N_PX, N_PX), |x, y| {
        CENTERS
            .iter()
            .enumerate()
            .find_map(|(q, (cx, cy))| {
                let (dx, dy) = (x as f64 - cx, y as f64 - cy);
                (dx * dx + dy * dy <= radius * radius).then(|| f(q, dx, dy))
            })
            .unwrap_or_default()
    })
}

/// Uniform pupil images of radius 4px
pub fn uniform() -> Frame {
    pupils(4., |_, _, _| 1f32)
}

/// Gaussian pupil images truncated at a radius of 4px
pub fn gaussian() -> Frame {
    pupils(4., |_, dx, dy| (-(dx * dx + dy * dy) / 18.).exp() as f32)
}
