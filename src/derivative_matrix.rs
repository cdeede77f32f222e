//! Packed storage of all partial derivatives of a variable up to some order.
//!
//! A derivative matrix of a dependent variable with respect to `k` independent
//! variables `x_0, .., x_{k-1}` consists of `2^k - 1` blocks, one for every non-empty
//! subset of the independent variables. The subset of block `i` (stored at position `i - 1`)
//! is given by the bits of `i`: bit `b` is set iff `x_b` participates.
//!
//! A block has one row per real of the dependent variable and one column for every
//! multi-index into the participating independent variables, where the right-most
//! variable varies fastest. For example, for `k = 2` with `x_0` of size 2 and `x_1` of size 3:
//!
//! | mask | derivative | columns |
//! | --- | --- | --- |
//! | `0b01` | `d/dx_0` | 2 |
//! | `0b10` | `d/dx_1` | 3 |
//! | `0b11` | `d^2/dx_0 dx_1` | 6 |
//!
//! Repeated independent variables denote higher derivatives: the block `0b11`
//! of `[x, x]` holds the second derivative with respect to `x`.

use std::fmt::Display;

use smallvec::SmallVec;

use crate::{
    error::Error,
    matrix::{Matrix, MatrixError},
    variable::Variable,
};

/// Indices or sizes for the participating variables of a block.
pub(crate) type Digits = SmallVec<[usize; 4]>;

/// All partial derivatives of a dependent variable with respect to an ordered list
/// of independent variables.
#[derive(Clone, Debug)]
pub struct DerivativeMatrix {
    dependent: Variable,
    independent_variables: Vec<Variable>,
    matrices: Vec<Matrix>,
}

impl DerivativeMatrix {
    /// Create a derivative matrix from its blocks, checking that there are `2^k - 1` blocks
    /// with consistent dimensions.
    pub fn new(
        dependent: Variable,
        independent_variables: Vec<Variable>,
        matrices: Vec<Matrix>,
    ) -> Result<DerivativeMatrix, Error> {
        let order = independent_variables.len();
        let expected = number_of_blocks(order)?;
        if matrices.len() != expected {
            return Err(Error::invalid(format!(
                "a derivative of order {} has {} blocks, found {}",
                order,
                expected,
                matrices.len()
            )));
        }

        let nrows = matrices[0].nrows();
        let sizes: Digits = (0..order)
            .map(|b| matrices[(1 << b) - 1].ncols())
            .collect();

        for (i, m) in matrices.iter().enumerate() {
            let ncols = block_columns(i + 1, &sizes)?;
            if m.nrows() != nrows || m.ncols() != ncols {
                return Err(Error::invalid(format!(
                    "block {} of a derivative matrix must be {}x{}, found {}x{}",
                    i + 1,
                    nrows,
                    ncols,
                    m.nrows(),
                    m.ncols()
                )));
            }
        }

        Ok(DerivativeMatrix {
            dependent,
            independent_variables,
            matrices,
        })
    }

    /// Create a derivative matrix of `dependent` with respect to `independent_variables` with all
    /// blocks zero. Every independent variable must have a positive size.
    pub fn zeros(
        dependent: &Variable,
        independent_variables: &[Variable],
    ) -> Result<DerivativeMatrix, Error> {
        let nrows = dependent.number_of_values()?;
        let mut sizes = Digits::with_capacity(independent_variables.len());
        for x in independent_variables {
            let n = x.number_of_values()?;
            if n == 0 {
                return Err(Error::invalid(format!(
                    "cannot differentiate with respect to {}, which has no values",
                    x
                )));
            }
            sizes.push(n);
        }

        Self::zeros_with_sizes(dependent, independent_variables, nrows, &sizes)
    }

    pub(crate) fn zeros_with_sizes(
        dependent: &Variable,
        independent_variables: &[Variable],
        nrows: usize,
        sizes: &[usize],
    ) -> Result<DerivativeMatrix, Error> {
        let blocks = number_of_blocks(sizes.len())?;

        let mut matrices = vec![];
        matrices
            .try_reserve_exact(blocks)
            .map_err(|_| Error::AllocationFailure {
                rows: blocks,
                columns: 0,
            })?;

        for mask in 1..=blocks {
            let ncols = block_columns(mask, sizes)?;
            matrices.push(Matrix::try_new(nrows, ncols).map_err(|e| match e {
                MatrixError::AllocationFailure { rows, columns } => {
                    Error::AllocationFailure { rows, columns }
                }
                e => e.into(),
            })?);
        }

        Ok(DerivativeMatrix {
            dependent: dependent.clone(),
            independent_variables: independent_variables.to_vec(),
            matrices,
        })
    }

    /// The order of the derivative, i.e. the number of independent variables.
    pub fn order(&self) -> usize {
        self.independent_variables.len()
    }

    pub fn dependent_variable(&self) -> &Variable {
        &self.dependent
    }

    pub fn independent_variables(&self) -> &[Variable] {
        &self.independent_variables
    }

    /// All blocks, where the block for subset `mask` is at position `mask - 1`.
    pub fn matrices(&self) -> &[Matrix] {
        &self.matrices
    }

    pub(crate) fn matrices_mut(&mut self) -> &mut [Matrix] {
        &mut self.matrices
    }

    /// The number of rows of every block, which is the size of the dependent variable.
    pub fn number_of_rows(&self) -> usize {
        self.matrices.first().map(|m| m.nrows()).unwrap_or(0)
    }

    /// The sizes of the independent variables.
    pub fn independent_sizes(&self) -> Digits {
        (0..self.order())
            .map(|b| self.matrices[(1 << b) - 1].ncols())
            .collect()
    }

    /// Get the block for the derivative with respect to `variables`, which must be
    /// a sub-sequence of the independent variables.
    pub fn matrix(&self, variables: &[Variable]) -> Result<&Matrix, Error> {
        if variables.is_empty() {
            return Err(Error::invalid("no variables given for a derivative block"));
        }

        let mut mask = 0;
        let mut start = 0;
        for v in variables {
            match self.independent_variables[start..]
                .iter()
                .position(|x| x.same_variable(v))
            {
                Some(p) => {
                    mask |= 1 << (start + p);
                    start += p + 1;
                }
                None => {
                    return Err(Error::invalid(format!(
                        "{} is not an independent variable of the remaining derivative",
                        v
                    )))
                }
            }
        }

        Ok(&self.matrices[mask - 1])
    }

    /// Replace the dependent variable.
    pub fn with_dependent(mut self, dependent: &Variable) -> DerivativeMatrix {
        self.dependent = dependent.clone();
        self
    }

    /// Return true iff `self` and `other` are derivatives of the same variables with blocks of
    /// the same dimensions.
    pub fn same_type(&self, other: &DerivativeMatrix) -> bool {
        self.dependent.same_variable(&other.dependent)
            && self.order() == other.order()
            && self
                .independent_variables
                .iter()
                .zip(&other.independent_variables)
                .all(|(a, b)| a.same_variable(b))
            && self
                .matrices
                .iter()
                .zip(&other.matrices)
                .all(|(a, b)| a.nrows() == b.nrows() && a.ncols() == b.ncols())
    }

    pub fn number_of_reals(&self) -> usize {
        self.matrices.iter().map(|m| m.data().len()).sum()
    }

    /// Concatenate the blocks, each in row-major order.
    pub fn get_reals(&self) -> Vec<f64> {
        let mut res = Vec::with_capacity(self.number_of_reals());
        for m in &self.matrices {
            res.extend_from_slice(m.data());
        }
        res
    }

    /// Create a derivative matrix with the same shape holding `reals`,
    /// laid out as in [Self::get_reals].
    pub fn with_reals(&self, reals: &[f64]) -> Result<DerivativeMatrix, Error> {
        if reals.len() != self.number_of_reals() {
            return Err(Error::mismatch(format!(
                "expected {} reals for a derivative matrix, found {}",
                self.number_of_reals(),
                reals.len()
            )));
        }

        let mut res = self.clone();
        let mut offset = 0;
        for m in &mut res.matrices {
            let len = m.data.len();
            m.data.copy_from_slice(&reals[offset..offset + len]);
            offset += len;
        }
        Ok(res)
    }

    /// Return true iff every block is zero.
    pub fn is_zero(&self) -> bool {
        self.matrices.iter().all(|m| m.is_zero())
    }
}

impl PartialEq for DerivativeMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other) && self.matrices == other.matrices
    }
}

impl Display for DerivativeMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}/d(", self.dependent)?;
        for (i, x) in self.independent_variables.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", x)?;
        }
        f.write_str(")=[")?;
        for (i, m) in self.matrices.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            m.fmt(f)?;
        }
        f.write_str("]")
    }
}

/// The number of blocks of a derivative of order `order`.
pub(crate) fn number_of_blocks(order: usize) -> Result<usize, Error> {
    if order == 0 || order >= usize::BITS as usize - 1 {
        Err(Error::invalid(format!(
            "cannot represent a derivative of order {}",
            order
        )))
    } else {
        Ok((1 << order) - 1)
    }
}

/// The positions of the set bits of `mask`, in increasing order.
pub(crate) fn mask_positions(mut mask: usize) -> Digits {
    let mut res = Digits::new();
    while mask != 0 {
        let p = mask.trailing_zeros() as usize;
        res.push(p);
        mask &= mask - 1;
    }
    res
}

/// The number of columns of the block `mask`, given the sizes of all independent variables.
pub(crate) fn block_columns(mask: usize, sizes: &[usize]) -> Result<usize, Error> {
    let mut ncols: usize = 1;
    for p in mask_positions(mask) {
        ncols = ncols
            .checked_mul(sizes[p])
            .ok_or(Error::AllocationFailure {
                rows: 0,
                columns: usize::MAX,
            })?;
    }
    Ok(ncols)
}

/// Split the column `col` into one index per radix, where the last radix varies fastest.
pub(crate) fn split_column(mut col: usize, radices: &[usize], digits: &mut Digits) {
    digits.clear();
    digits.resize(radices.len(), 0);
    for (d, r) in digits.iter_mut().zip(radices).rev() {
        *d = col % r;
        col /= r;
    }
}

/// Combine one index per radix into a column, where the last radix varies fastest.
pub(crate) fn join_column(digits: &[usize], radices: &[usize]) -> usize {
    digits
        .iter()
        .zip(radices)
        .fold(0, |acc, (d, r)| acc * r + d)
}

#[cfg(test)]
mod test {
    use super::{join_column, mask_positions, split_column, DerivativeMatrix, Digits};
    use crate::{error::Error, matrix::Matrix, value::Value, variable::Variable};

    #[test]
    fn layout() {
        let y = Variable::new("y");
        y.set_independent(Value::RealVector(vec![0.; 4])).unwrap();
        let a = Variable::new("a");
        a.set_independent(Value::RealVector(vec![0.; 2])).unwrap();
        let b = Variable::new("b");
        b.set_independent(Value::RealVector(vec![0.; 3])).unwrap();

        let d = DerivativeMatrix::zeros(&y, &[a.clone(), b.clone(), a.clone()]).unwrap();
        assert_eq!(d.order(), 3);
        assert_eq!(d.matrices().len(), 7);
        let dims: Vec<_> = d
            .matrices()
            .iter()
            .map(|m| (m.nrows(), m.ncols()))
            .collect();
        assert_eq!(
            dims,
            vec![(4, 2), (4, 3), (4, 6), (4, 2), (4, 4), (4, 6), (4, 12)]
        );
        assert_eq!(d.independent_sizes().to_vec(), vec![2, 3, 2]);
        assert_eq!(d.number_of_reals(), 4 * (2 + 3 + 6 + 2 + 4 + 6 + 12));
        assert!(d.is_zero());

        assert_eq!(d.matrix(&[b.clone(), a.clone()]).unwrap().ncols(), 6);
        assert_eq!(d.matrix(&[a.clone(), a.clone()]).unwrap().ncols(), 4);
        assert!(d.matrix(&[b.clone(), b.clone()]).is_err());
    }

    #[test]
    fn validation() {
        let y = Variable::new("y");
        y.set_independent(Value::Real(0.)).unwrap();

        assert!(DerivativeMatrix::new(y.clone(), vec![y.clone()], vec![Matrix::new(1, 1)]).is_ok());
        assert!(matches!(
            DerivativeMatrix::new(
                y.clone(),
                vec![y.clone(), y.clone()],
                vec![Matrix::new(1, 1), Matrix::new(1, 1)]
            ),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            DerivativeMatrix::new(
                y.clone(),
                vec![y.clone(), y.clone()],
                vec![Matrix::new(1, 1), Matrix::new(1, 1), Matrix::new(1, 2)]
            ),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            DerivativeMatrix::zeros(&y, &[]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn reals() {
        let y = Variable::new("y");
        y.set_independent(Value::RealVector(vec![0.; 2])).unwrap();

        let d = DerivativeMatrix::zeros(&y, &[y.clone(), y.clone()]).unwrap();
        let reals: Vec<f64> = (0..d.number_of_reals()).map(|i| i as f64).collect();
        let e = d.with_reals(&reals).unwrap();
        assert_eq!(e.get_reals(), reals);
        assert_eq!(e.matrices()[2][(1, 3)], 15.);
        assert!(d.same_type(&e));
        assert_ne!(d, e);
        assert!(d.with_reals(&reals[1..]).is_err());
    }

    #[test]
    fn columns() {
        assert_eq!(mask_positions(0b1011).to_vec(), vec![0, 1, 3]);

        let mut digits = Digits::new();
        split_column(17, &[2, 3, 4], &mut digits);
        assert_eq!(digits.to_vec(), vec![1, 1, 1]);
        assert_eq!(join_column(&digits, &[2, 3, 4]), 17);
    }
}
