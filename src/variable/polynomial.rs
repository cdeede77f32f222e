use crate::{
    context::Context,
    derivative_matrix::{mask_positions, DerivativeMatrix},
    error::Error,
    value::Value,
};

use super::{coordinates::check_leaf, Variable, VariableKind};

impl Variable {
    /// Make the variable the polynomial `sum_i coefficients[i] * input^i` of a scalar
    /// independent variable `input`.
    pub fn set_polynomial(&self, input: &Variable, coefficients: Vec<f64>) -> Result<(), Error> {
        check_leaf(input, 1)?;

        self.set_kind(VariableKind::Polynomial {
            input: input.clone(),
            coefficients,
        })
    }

    pub fn get_polynomial(&self) -> Option<(Variable, Vec<f64>)> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::Polynomial {
                input,
                coefficients,
            }) => Some((input.clone(), coefficients.clone())),
            _ => None,
        }
    }
}

/// Evaluate the `order`th derivative of the polynomial at `x`.
fn horner(coefficients: &[f64], order: usize, x: f64) -> f64 {
    let mut res = 0.;
    for (i, c) in coefficients.iter().enumerate().skip(order).rev() {
        let falling: f64 = ((i - order + 1)..=i).map(|k| k as f64).product();
        res = res * x + c * falling;
    }
    res
}

fn input_value(input: &Variable, context: &Context) -> Result<f64, Error> {
    match input.evaluate(context)?.get_reals().as_slice() {
        [x] => Ok(*x),
        r => Err(Error::mismatch(format!(
            "the input of a polynomial must be a scalar, found {} reals",
            r.len()
        ))),
    }
}

pub(super) fn evaluate(
    input: &Variable,
    coefficients: &[f64],
    context: &Context,
) -> Result<Value, Error> {
    Ok(Value::Real(horner(
        coefficients,
        0,
        input_value(input, context)?,
    )))
}

pub(super) fn derivative(
    input: &Variable,
    coefficients: &[f64],
    total: &mut DerivativeMatrix,
    context: &Context,
) -> Result<(), Error> {
    let x = input_value(input, context)?;
    let is_input: Vec<bool> = total
        .independent_variables()
        .iter()
        .map(|v| v.same_variable(input))
        .collect();

    for (i, m) in total.matrices_mut().iter_mut().enumerate() {
        let positions = mask_positions(i + 1);
        if positions.iter().all(|p| is_input[*p]) {
            m[(0, 0)] = horner(coefficients, positions.len(), x);
        }
    }

    Ok(())
}
