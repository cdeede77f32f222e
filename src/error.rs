//! Errors reported by evaluation and differentiation.

use thiserror::Error;

use crate::matrix::MatrixError;

/// An error raised while building, evaluating or differentiating variables.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An operand is untyped or otherwise unusable, or a derivative order is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The value types of two operands are incompatible.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// Installing a link would make a variable depend on itself.
    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),
    #[error("Could not allocate a {rows}x{columns} matrix")]
    AllocationFailure { rows: usize, columns: usize },
    /// The variant cannot produce a derivative of the requested order.
    ///
    /// Callers may treat this as a zero contribution, see [Error::is_unimplemented].
    #[error("Not implemented: {0}")]
    Unimplemented(String),
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

impl Error {
    /// Return true iff the error only signals a missing derivative formula.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Error::Unimplemented(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Error {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn mismatch(msg: impl Into<String>) -> Error {
        Error::TypeMismatch(msg.into())
    }
}

#[cfg(test)]
mod test {
    use super::Error;
    use crate::matrix::MatrixError;

    #[test]
    fn conversion() {
        let e: Error = MatrixError::ShapeMismatch {
            expected: (2, 3),
            found: (3, 2),
        }
        .into();
        assert!(matches!(e, Error::Matrix(_)));
        assert!(!e.is_unimplemented());
        assert!(Error::Unimplemented("order 3".into()).is_unimplemented());
        assert_eq!(
            Error::AllocationFailure {
                rows: 4,
                columns: 5
            }
            .to_string(),
            "Could not allocate a 4x5 matrix"
        );
    }
}
