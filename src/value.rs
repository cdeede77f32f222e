//! Type-tagged containers for the results of evaluation.

use std::fmt::Display;

use crate::{derivative_matrix::DerivativeMatrix, error::Error, matrix::Matrix};

/// The kind of a [Value].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Real,
    RealVector,
    Matrix,
    DerivativeMatrix,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Real => f.write_str("real"),
            ValueKind::RealVector => f.write_str("real vector"),
            ValueKind::Matrix => f.write_str("matrix"),
            ValueKind::DerivativeMatrix => f.write_str("derivative matrix"),
        }
    }
}

/// A computed result: a real, a vector of reals, a dense matrix or a derivative matrix.
///
/// Every kind has a projection onto a flat list of reals, see [Value::get_reals].
/// Matrices are projected row by row, derivative matrices block after block.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Real(f64),
    RealVector(Vec<f64>),
    Matrix(Matrix),
    DerivativeMatrix(DerivativeMatrix),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Real(_) => ValueKind::Real,
            Value::RealVector(_) => ValueKind::RealVector,
            Value::Matrix(_) => ValueKind::Matrix,
            Value::DerivativeMatrix(_) => ValueKind::DerivativeMatrix,
        }
    }

    /// Return true iff `self` and `other` have the same kind and shape.
    pub fn same_type(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Real(_), Value::Real(_)) => true,
            (Value::RealVector(a), Value::RealVector(b)) => a.len() == b.len(),
            (Value::Matrix(a), Value::Matrix(b)) => {
                a.nrows() == b.nrows() && a.ncols() == b.ncols()
            }
            (Value::DerivativeMatrix(a), Value::DerivativeMatrix(b)) => a.same_type(b),
            _ => false,
        }
    }

    /// Overwrite `self` with a copy of `src`, which must have the same type.
    pub fn copy_from(&mut self, src: &Value) -> Result<(), Error> {
        if !self.same_type(src) {
            return Err(Error::mismatch(format!(
                "cannot copy a {} of {} reals into a {} of {} reals",
                src.kind(),
                src.number_of_reals(),
                self.kind(),
                self.number_of_reals()
            )));
        }

        *self = src.clone();
        Ok(())
    }

    /// Return the number of reals in the flat projection.
    pub fn number_of_reals(&self) -> usize {
        match self {
            Value::Real(_) => 1,
            Value::RealVector(v) => v.len(),
            Value::Matrix(m) => m.data().len(),
            Value::DerivativeMatrix(d) => d.number_of_reals(),
        }
    }

    /// Project the value onto a flat list of reals.
    pub fn get_reals(&self) -> Vec<f64> {
        match self {
            Value::Real(r) => vec![*r],
            Value::RealVector(v) => v.clone(),
            Value::Matrix(m) => m.data().to_vec(),
            Value::DerivativeMatrix(d) => d.get_reals(),
        }
    }

    /// Create a value of the same type as `self` that holds `reals`.
    pub fn from_reals_like(&self, reals: &[f64]) -> Result<Value, Error> {
        if reals.len() != self.number_of_reals() {
            return Err(Error::mismatch(format!(
                "expected {} reals for a {}, found {}",
                self.number_of_reals(),
                self.kind(),
                reals.len()
            )));
        }

        Ok(match self {
            Value::Real(_) => Value::Real(reals[0]),
            Value::RealVector(_) => Value::RealVector(reals.to_vec()),
            Value::Matrix(m) => Value::Matrix(Matrix::from_linear(
                reals.to_vec(),
                m.nrows(),
                m.ncols(),
            )?),
            Value::DerivativeMatrix(d) => Value::DerivativeMatrix(d.with_reals(reals)?),
        })
    }

    /// Add the derivative of the composition of `f` and `g` to `self`.
    /// All three values must be derivative matrices,
    /// see [DerivativeMatrix::multiply_and_accumulate].
    pub fn multiply_and_accumulate(&mut self, f: &Value, g: &Value) -> Result<(), Error> {
        match (self, f, g) {
            (
                Value::DerivativeMatrix(total),
                Value::DerivativeMatrix(f),
                Value::DerivativeMatrix(g),
            ) => total.multiply_and_accumulate(f, g),
            (total, f, g) => Err(Error::invalid(format!(
                "multiply and accumulate requires derivative matrices, found {}, {} and {}",
                total.kind(),
                f.kind(),
                g.kind()
            ))),
        }
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::RealVector(v)
    }
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Value::Matrix(m)
    }
}

impl From<DerivativeMatrix> for Value {
    fn from(d: DerivativeMatrix) -> Self {
        Value::DerivativeMatrix(d)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Real(r) => write!(f, "{}", r),
            Value::RealVector(v) => {
                f.write_str("[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", x)?;
                }
                f.write_str("]")
            }
            Value::Matrix(m) => m.fmt(f),
            Value::DerivativeMatrix(d) => d.fmt(f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Value, ValueKind};
    use crate::{error::Error, matrix::Matrix};

    #[test]
    fn projection() {
        let m = Value::Matrix(Matrix::from_linear(vec![1., 2., 3., 4., 5., 6.], 2, 3).unwrap());
        assert_eq!(m.kind(), ValueKind::Matrix);
        assert_eq!(m.number_of_reals(), 6);
        assert_eq!(m.get_reals(), vec![1., 2., 3., 4., 5., 6.]);

        let n = m.from_reals_like(&[6., 5., 4., 3., 2., 1.]).unwrap();
        assert!(n.same_type(&m));
        assert_eq!(n.get_reals(), vec![6., 5., 4., 3., 2., 1.]);
        assert!(matches!(
            m.from_reals_like(&[1.]),
            Err(Error::TypeMismatch(_))
        ));

        assert_eq!(Value::Real(2.).get_reals(), vec![2.]);
    }

    #[test]
    fn copy() {
        let mut a = Value::RealVector(vec![1., 2.]);
        a.copy_from(&Value::RealVector(vec![3., 4.])).unwrap();
        assert_eq!(a, Value::RealVector(vec![3., 4.]));

        assert!(matches!(
            a.copy_from(&Value::RealVector(vec![3.])),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            a.copy_from(&Value::Real(3.)),
            Err(Error::TypeMismatch(_))
        ));
        assert_eq!(a, Value::RealVector(vec![3., 4.]));
    }

    #[test]
    fn multiply_requires_derivatives() {
        let mut a = Value::Real(1.);
        assert!(matches!(
            a.multiply_and_accumulate(&Value::Real(1.), &Value::Real(1.)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn display() {
        assert_eq!(Value::RealVector(vec![1., 2.5]).to_string(), "[1,2.5]");
        assert_eq!(Value::Real(3.).to_string(), "3");
    }
}
