use crate::{
    context::Context, derivative_matrix::DerivativeMatrix, error::Error, matrix::Matrix,
    value::Value,
};

use super::{Variable, VariableKind};

impl Variable {
    /// Make the variable the concatenation of the reals of `parts`.
    pub fn set_composite(&self, parts: Vec<Variable>) -> Result<(), Error> {
        self.set_kind(VariableKind::Composite(parts))
    }

    pub fn get_composite(&self) -> Option<Vec<Variable>> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::Composite(parts)) => Some(parts.clone()),
            _ => None,
        }
    }
}

pub(super) fn evaluate(parts: &[Variable], context: &Context) -> Result<Value, Error> {
    let mut reals = vec![];
    for p in parts {
        reals.extend(p.evaluate(context)?.get_reals());
    }
    Ok(Value::RealVector(reals))
}

/// Stack the blocks of the parts.
pub(super) fn derivative(
    parts: &[Variable],
    total: &mut DerivativeMatrix,
    context: &Context,
) -> Result<(), Error> {
    let independent_variables = total.independent_variables().to_vec();
    let derivatives = parts
        .iter()
        .map(|p| p.evaluate_derivative(&independent_variables, context))
        .collect::<Result<Vec<_>, _>>()?;

    for (i, m) in total.matrices_mut().iter_mut().enumerate() {
        let ncols = m.ncols();
        let stacked = Matrix::stack_rows(derivatives.iter().map(|d| &d.matrices()[i]), ncols)?;
        stacked.check_shape(m.nrows(), ncols)?;
        *m = stacked;
    }

    Ok(())
}
