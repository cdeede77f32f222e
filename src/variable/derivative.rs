//! Variables whose value is a derivative matrix of another variable.

use crate::{
    context::Context,
    derivative_matrix::{block_columns, number_of_blocks, DerivativeMatrix, Digits},
    error::Error,
};

use super::{Variable, VariableKind};

impl Variable {
    /// Make the variable the derivative of `dependent` with respect to `independent_variables`.
    /// It evaluates to the derivative matrix, with the reals of the blocks concatenated.
    pub fn set_derivative(
        &self,
        dependent: &Variable,
        independent_variables: Vec<Variable>,
    ) -> Result<(), Error> {
        number_of_blocks(independent_variables.len())?;

        self.set_kind(VariableKind::Derivative {
            dependent: dependent.clone(),
            independent_variables,
        })
    }

    pub fn get_derivative(&self) -> Option<(Variable, Vec<Variable>)> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::Derivative {
                dependent,
                independent_variables,
            }) => Some((dependent.clone(), independent_variables.clone())),
            _ => None,
        }
    }
}

fn sizes(independent_variables: &[Variable]) -> Result<Digits, Error> {
    independent_variables
        .iter()
        .map(|x| x.number_of_values())
        .collect()
}

pub(super) fn number_of_values(
    dependent: &Variable,
    independent_variables: &[Variable],
) -> Result<usize, Error> {
    let rows = dependent.number_of_values()?;
    let sizes = sizes(independent_variables)?;

    let mut total: usize = 0;
    for mask in 1..=number_of_blocks(sizes.len())? {
        total = block_columns(mask, &sizes)?
            .checked_mul(rows)
            .and_then(|n| total.checked_add(n))
            .ok_or(Error::AllocationFailure {
                rows,
                columns: usize::MAX,
            })?;
    }
    Ok(total)
}

/// Differentiate the derivative of `dependent` with respect to `inner` further, by
/// reading the blocks of the derivative with respect to `inner` followed by the
/// independent variables of `total`.
pub(super) fn derivative(
    dependent: &Variable,
    inner: &[Variable],
    total: &mut DerivativeMatrix,
    context: &Context,
) -> Result<(), Error> {
    let k = inner.len();
    let mut all = inner.to_vec();
    all.extend(total.independent_variables().iter().cloned());

    let full = dependent.evaluate_derivative(&all, context)?;
    let rows = full.number_of_rows();
    let inner_sizes = sizes(inner)?;

    for (t, m) in total.matrices_mut().iter_mut().enumerate() {
        let outer_mask = t + 1;
        let outer_cols = m.ncols();

        let mut offset = 0;
        for inner_mask in 1..=number_of_blocks(k)? {
            let inner_cols = block_columns(inner_mask, &inner_sizes)?;
            let src = &full.matrices()[(inner_mask | (outer_mask << k)) - 1];

            for r in 0..rows {
                for ci in 0..inner_cols {
                    for co in 0..outer_cols {
                        m[(offset + r * inner_cols + ci, co)] = src[(r, ci * outer_cols + co)];
                    }
                }
            }

            offset += rows * inner_cols;
        }
    }

    Ok(())
}
