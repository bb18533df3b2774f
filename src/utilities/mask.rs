use serde::{Deserialize, Serialize};

/// Squared distance slack in pixel² when testing if a pixel lies within a disc
///
/// Pixels at exactly the disc radius must be selected regardless of the round-off
/// in the disc center coordinates.
const EDGE_TOLERANCE: f64 = 1e-6;

/// A binary mask of the detector frame
///
/// The mask stores the linear indices of its active pixels in row major order,
/// the pixel `(x,y)` of a frame of resolution `(nx,ny)` having the index `x*ny+y`.
/// The rank of an active pixel in that sequence is the sub-aperture index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PupilMask {
    pub(crate) resolution: (usize, usize),
    pub(crate) index: Vec<usize>,
}
impl PupilMask {
    /// Creates a mask selecting the pixels within a disc
    ///
    /// A pixel `(x,y)` is selected if `(x-cx)²+(y-cy)² <= radius²`
    pub fn disc(resolution: (usize, usize), center: (f64, f64), radius: f64) -> Self {
        let (nx, ny) = resolution;
        let (cx, cy) = center;
        let r2 = radius * radius + EDGE_TOLERANCE;
        let index = (0..nx)
            .flat_map(|x| (0..ny).map(move |y| (x, y)))
            .filter(|&(x, y)| (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) <= r2)
            .map(|(x, y)| x * ny + y)
            .collect();
        Self { resolution, index }
    }
    /// Creates a mask from a boolean vector in row major order
    pub fn from_vec(resolution: (usize, usize), mask: &[bool]) -> Self {
        assert_eq!(resolution.0 * resolution.1, mask.len());
        Self {
            resolution,
            index: mask
                .iter()
                .enumerate()
                .filter_map(|(i, m)| m.then_some(i))
                .collect(),
        }
    }
    /// Returns the mask resolution
    pub fn resolution(&self) -> (usize, usize) {
        self.resolution
    }
    /// Returns the total number of mask elements
    pub fn nel(&self) -> usize {
        self.resolution.0 * self.resolution.1
    }
    /// Returns the number of active pixels
    pub fn nnz(&self) -> usize {
        self.index.len()
    }
    /// Returns the linear indices of the active pixels
    pub fn indices(&self) -> &[usize] {
        &self.index
    }
    /// Checks that the active pixel indices are strictly increasing and within the frame
    pub fn is_valid(&self) -> bool {
        self.index.windows(2).all(|w| w[0] < w[1])
            && self.index.last().map_or(true, |&i| i < self.nel())
    }
    /// Checks if the pixel `(x,y)` is active
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.resolution.0
            && y < self.resolution.1
            && self.index.binary_search(&(x * self.resolution.1 + y)).is_ok()
    }
    /// Returns an iterator over the mask values
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        let mut active = self.index.iter().peekable();
        (0..self.nel()).map(move |i| active.next_if_eq(&&i).is_some())
    }
    /// Returns the mask as a boolean vector
    pub fn to_vec(&self) -> Vec<bool> {
        self.iter().collect()
    }
    /// Returns the mask as a `nx x ny` matrix
    pub fn to_matrix(&self) -> nalgebra::DMatrix<bool> {
        let (nx, ny) = self.resolution;
        nalgebra::DMatrix::from_row_iterator(nx, ny, self.iter())
    }
    /// Returns the values of `data` at the active pixels
    pub fn gather<'a>(&'a self, data: &'a [f32]) -> impl Iterator<Item = f32> + 'a {
        self.index.iter().map(move |&i| data[i])
    }
    /// Writes `values` at the active pixels of a zeroed frame
    pub fn scatter(&self, values: &[f32]) -> Vec<f32> {
        assert_eq!(values.len(), self.nnz());
        let mut data = vec![0f32; self.nel()];
        self.index
            .iter()
            .zip(values)
            .for_each(|(&i, &v)| data[i] = v);
        data
    }
    /// Keeps only the active pixels whose sub-aperture index is flagged in `keep`
    pub fn retain(&mut self, keep: &[bool]) {
        assert_eq!(keep.len(), self.nnz());
        let mut keep = keep.iter();
        self.index.retain(|_| keep.next().copied().unwrap_or_default());
    }
}
