//! Dense row-major matrices of reals, the storage of every derivative block.

use std::{
    fmt::Display,
    ops::{Index, IndexMut},
};

use thiserror::Error;

/// A dense matrix of reals, stored row by row.
/// A vector can be represented as a matrix with one column.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Matrix {
    pub(crate) data: Vec<f64>,
    pub(crate) nrows: usize,
    pub(crate) ncols: usize,
}

impl Matrix {
    /// Create a new zeroed matrix with `nrows` rows and `ncols` columns.
    pub fn new(nrows: usize, ncols: usize) -> Matrix {
        Matrix {
            data: vec![0.; nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Create a new zeroed matrix with `nrows` rows and `ncols` columns,
    /// reporting an error instead of aborting when the storage cannot be allocated.
    pub fn try_new(nrows: usize, ncols: usize) -> Result<Matrix, MatrixError> {
        let failure = MatrixError::AllocationFailure {
            rows: nrows,
            columns: ncols,
        };

        let len = nrows.checked_mul(ncols).ok_or(failure.clone())?;
        if len.checked_mul(std::mem::size_of::<f64>()).is_none() {
            return Err(failure);
        }

        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| failure)?;
        data.resize(len, 0.);

        Ok(Matrix { data, nrows, ncols })
    }

    /// Create a new square matrix with `nrows` rows and ones on the main diagonal
    /// and zeroes elsewhere.
    pub fn identity(nrows: usize) -> Matrix {
        let mut m = Matrix::new(nrows, nrows);
        for i in 0..nrows {
            m[(i, i)] = 1.;
        }
        m
    }

    /// Convert a linear representation of a matrix to a `Matrix`.
    pub fn from_linear(data: Vec<f64>, nrows: usize, ncols: usize) -> Result<Matrix, MatrixError> {
        if Some(data.len()) == nrows.checked_mul(ncols) {
            Ok(Matrix { data, nrows, ncols })
        } else {
            Err(MatrixError::DataLength {
                len: data.len(),
                nrows,
                ncols,
            })
        }
    }

    /// Create a new matrix from a 2-dimensional vector of scalars.
    pub fn from_nested_vec(matrix: Vec<Vec<f64>>) -> Result<Matrix, MatrixError> {
        let mut data = vec![];

        let cols = matrix.first().map(|r| r.len()).unwrap_or(0);
        let rows = matrix.len();

        for d in matrix {
            if d.len() != cols {
                return Err(MatrixError::NotRectangular);
            }

            data.extend(d);
        }

        Ok(Matrix {
            nrows: rows,
            ncols: cols,
            data,
        })
    }

    /// Stack the rows of `blocks` on top of each other.
    /// All blocks must have the same number of columns.
    pub fn stack_rows<'a>(
        blocks: impl IntoIterator<Item = &'a Matrix>,
        ncols: usize,
    ) -> Result<Matrix, MatrixError> {
        let mut m = Matrix::new(0, ncols);
        for b in blocks {
            if b.ncols != ncols {
                return Err(MatrixError::ShapeMismatch {
                    expected: (b.nrows, ncols),
                    found: (b.nrows, b.ncols),
                });
            }
            m.data.extend_from_slice(&b.data);
            m.nrows += b.nrows;
        }
        Ok(m)
    }

    /// Return the number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Return the number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Return the entries in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Return true iff every entry in the matrix is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|e| *e == 0.)
    }

    /// Check that the matrix has `nrows` rows and `ncols` columns.
    pub fn check_shape(&self, nrows: usize, ncols: usize) -> Result<(), MatrixError> {
        if self.nrows != nrows || self.ncols != ncols {
            Err(MatrixError::ShapeMismatch {
                expected: (nrows, ncols),
                found: (self.nrows, self.ncols),
            })
        } else {
            Ok(())
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    /// Get the `i`th row and `j`th column of the matrix, where `index=(i,j)`.
    #[inline]
    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.data[index.0 * self.ncols + index.1]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    /// Get the `i`th row and `j`th column of the matrix, where `index=(i,j)`.
    #[inline]
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.data[index.0 * self.ncols + index.1]
    }
}

impl Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for r in 0..self.nrows {
            if r > 0 {
                f.write_str(",")?;
            }
            f.write_str("{")?;
            for c in 0..self.ncols {
                if c > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", self[(r, c)])?;
            }
            f.write_str("}")?;
        }
        f.write_str("}")
    }
}

/// Errors that can occur when creating or combining matrices.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("Expected a {}x{} matrix, found {}x{}", expected.0, expected.1, found.0, found.1)]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Data length does not match matrix dimensions: {len} vs ({nrows},{ncols})")]
    DataLength {
        len: usize,
        nrows: usize,
        ncols: usize,
    },
    #[error("Matrix is not rectangular")]
    NotRectangular,
    #[error("Could not allocate a {rows}x{columns} matrix")]
    AllocationFailure { rows: usize, columns: usize },
}

#[cfg(test)]
mod test {
    use super::{Matrix, MatrixError};

    #[test]
    fn basics() {
        let a = Matrix::from_linear(vec![1., 2., 3., 4., 5., 6.], 2, 3).unwrap();
        assert_eq!(a[(1, 0)], 4.);
        assert_eq!(a.to_string(), "{{1,2,3},{4,5,6}}");

        let b = Matrix::from_nested_vec(vec![vec![1., 2., 3.], vec![4., 5., 6.]]).unwrap();
        assert_eq!(a, b);

        let mut c = a.clone();
        c[(1, 2)] = 7.;
        assert_eq!(c.data(), &[1., 2., 3., 4., 5., 7.]);
        assert!(!c.is_zero());
        assert!(Matrix::new(2, 3).is_zero());

        assert_eq!(
            Matrix::from_linear(vec![1., 2.], 2, 3),
            Err(MatrixError::DataLength {
                len: 2,
                nrows: 2,
                ncols: 3
            })
        );
        assert_eq!(
            Matrix::from_nested_vec(vec![vec![1.], vec![1., 2.]]),
            Err(MatrixError::NotRectangular)
        );
    }

    #[test]
    fn identity() {
        let i = Matrix::identity(3);
        assert_eq!(i.data(), &[1., 0., 0., 0., 1., 0., 0., 0., 1.]);
        assert!(i.check_shape(3, 3).is_ok());
        assert!(i.check_shape(3, 2).is_err());
    }

    #[test]
    fn stack() {
        let a = Matrix::identity(2);
        let b = Matrix::new(3, 2);
        let s = Matrix::stack_rows([&a, &b], 2).unwrap();
        assert_eq!((s.nrows(), s.ncols()), (5, 2));
        assert_eq!(s[(1, 1)], 1.);
        assert_eq!(s[(4, 1)], 0.);

        assert!(Matrix::stack_rows([&a, &Matrix::new(1, 3)], 2).is_err());
    }

    #[test]
    fn allocation_failure() {
        assert_eq!(
            Matrix::try_new(usize::MAX, 2),
            Err(MatrixError::AllocationFailure {
                rows: usize::MAX,
                columns: 2
            })
        );
        assert_eq!(Matrix::try_new(2, 2).unwrap(), Matrix::new(2, 2));
    }
}
