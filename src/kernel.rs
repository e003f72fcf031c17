//! Convolution kernels.

use ndarray::Array2;

use crate::error::{Error, Result};

/// A 1D or 2D convolution kernel with odd extent in both dimensions,
/// addressed with its centre at `(rows/2, cols/2)`.
#[derive(Clone, Debug)]
pub struct Kernel {
    rows: usize,
    cols: usize,
    data: Array2<f32>,
}

impl Kernel {
    /// Build a kernel from row-major coefficients.
    pub fn new(rows: usize, cols: usize, coeffs: Vec<f32>) -> Result<Kernel> {
        if rows == 0 || cols == 0 || rows % 2 == 0 || cols % 2 == 0 || coeffs.len() != rows * cols
        {
            return Err(Error::KernelShape {
                rows,
                cols,
                len: coeffs.len(),
            });
        }
        let data = Array2::from_shape_vec((rows, cols), coeffs)
            .expect("coefficient count was checked above");
        Ok(Kernel { rows, cols, data })
    }

    /// A horizontal 1-row kernel.
    pub fn row(coeffs: Vec<f32>) -> Result<Kernel> {
        let cols = coeffs.len();
        Kernel::new(1, cols, coeffs)
    }

    /// A vertical 1-column kernel.
    pub fn column(coeffs: Vec<f32>) -> Result<Kernel> {
        let rows = coeffs.len();
        Kernel::new(rows, 1, coeffs)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// A separable kernel has a single row or a single column.
    pub fn is_separable(&self) -> bool {
        self.rows == 1 || self.cols == 1
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[[row, col]]
    }

    /// Row-major coefficient slice.
    pub fn coeffs(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("kernel storage is contiguous row-major")
    }

    /// The dense 2D kernel equal to the outer product of a column and a row
    /// kernel; used to cross-check separable convolutions.
    pub fn outer(col: &Kernel, row: &Kernel) -> Result<Kernel> {
        let rows = col.rows * col.cols;
        let cols = row.rows * row.cols;
        let mut coeffs = Vec::with_capacity(rows * cols);
        for &cv in col.coeffs() {
            for &rv in row.coeffs() {
                coeffs.push(cv * rv);
            }
        }
        Kernel::new(rows, cols, coeffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_kernel_rejected() {
        assert!(Kernel::new(2, 3, vec![0.0; 6]).is_err());
        assert!(Kernel::new(3, 3, vec![0.0; 8]).is_err());
    }

    #[test]
    fn test_centre_addressing() {
        let k = Kernel::new(3, 3, (0..9).map(|v| v as f32).collect()).unwrap();
        assert_eq!(k.get(1, 1), 4.0);
        assert!(!k.is_separable());
    }

    #[test]
    fn test_outer_product() {
        let col = Kernel::column(vec![1.0, 2.0, 1.0]).unwrap();
        let row = Kernel::row(vec![0.5, 1.0, 0.5]).unwrap();
        let dense = Kernel::outer(&col, &row).unwrap();
        assert_eq!(dense.rows(), 3);
        assert_eq!(dense.cols(), 3);
        assert_eq!(dense.get(1, 1), 2.0);
        assert_eq!(dense.get(0, 0), 0.5);
    }
}
