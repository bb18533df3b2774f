use std::ops::{AddAssign, Mul};

use serde::{Deserialize, Serialize};

/// Detector frame
///
/// The frame values are stored in row major order: the pixel `(x,y)` of a frame of
/// resolution `(nx,ny)` is `value[x*ny+y]`
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame<T = f32> {
    pub resolution: (usize, usize),
    pub value: Vec<T>,
}

impl<T: Clone + Default> Frame<T> {
    /// Creates a frame filled with zeros
    pub fn zeros(resolution: (usize, usize)) -> Self {
        Self {
            resolution,
            value: vec![T::default(); resolution.0 * resolution.1],
        }
    }
}
impl<T> Frame<T> {
    /// Creates a frame with the pixel values given by `f(x,y)`
    pub fn from_fn<F>(resolution: (usize, usize), mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let (nx, ny) = resolution;
        Self {
            resolution,
            value: (0..nx)
                .flat_map(|x| (0..ny).map(move |y| (x, y)))
                .map(|(x, y)| f(x, y))
                .collect(),
        }
    }
    /// Returns the value of the pixel `(x,y)`
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        let (nx, ny) = self.resolution;
        if x < nx && y < ny {
            self.value.get(x * ny + y)
        } else {
            None
        }
    }
    /// Checks that the frame is square with an even size so it splits into 4 quadrants
    pub fn is_quadrant_split(&self) -> bool {
        let (nx, ny) = self.resolution;
        nx == ny && nx > 0 && nx % 2 == 0 && self.value.len() == nx * ny
    }
    /// Returns the sub-frame `[0,nx)x[0,ny)`
    pub fn crop(&self, nx: usize, ny: usize) -> Self
    where
        T: Clone,
    {
        let n = self.resolution.1;
        Self {
            resolution: (nx, ny),
            value: self
                .value
                .chunks(n)
                .take(nx)
                .flat_map(|row| row[..ny].to_vec())
                .collect(),
        }
    }
}
impl Frame<f32> {
    /// Returns the sum of the frame values
    pub fn sum(&self) -> f64 {
        self.value.iter().map(|v| *v as f64).sum()
    }
    /// Returns the frame as a `nx x ny` matrix
    pub fn to_matrix(&self) -> nalgebra::DMatrix<f32> {
        let (nx, ny) = self.resolution;
        nalgebra::DMatrix::from_row_slice(nx, ny, &self.value)
    }
}
impl From<nalgebra::DMatrix<f32>> for Frame<f32> {
    /// Converts a matrix into a frame, the matrix rows are along the frame x axis
    fn from(mat: nalgebra::DMatrix<f32>) -> Self {
        Self {
            resolution: mat.shape(),
            value: mat.transpose().as_slice().to_vec(),
        }
    }
}
impl AddAssign<&Frame<f32>> for Frame<f32> {
    fn add_assign(&mut self, rhs: &Frame<f32>) {
        assert_eq!(
            self.resolution, rhs.resolution,
            "frames resolution mismatch"
        );
        self.value
            .iter_mut()
            .zip(&rhs.value)
            .for_each(|(a, b)| *a += *b);
    }
}
impl Mul<f32> for Frame<f32> {
    type Output = Frame<f32>;

    fn mul(mut self, rhs: f32) -> Self::Output {
        self.value.iter_mut().for_each(|v| *v *= rhs);
        self
    }
}
