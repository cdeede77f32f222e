use crate::{
    context::Context,
    derivative_matrix::{mask_positions, DerivativeMatrix},
    error::Error,
    value::Value,
};

use super::{Variable, VariableKind};

impl Variable {
    /// Make the variable the scalar product of the independent variables `u` and `v`,
    /// which must have the same number of reals.
    pub fn set_dot_product(&self, u: &Variable, v: &Variable) -> Result<(), Error> {
        let n = u
            .get_independent()
            .ok_or_else(|| Error::mismatch(format!("{} must be an independent variable", u)))?
            .number_of_reals();
        super::coordinates::check_leaf(v, n)?;

        self.set_kind(VariableKind::DotProduct {
            u: u.clone(),
            v: v.clone(),
        })
    }

    pub fn get_dot_product(&self) -> Option<(Variable, Variable)> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::DotProduct { u, v }) => Some((u.clone(), v.clone())),
            _ => None,
        }
    }
}

pub(super) fn evaluate(u: &Variable, v: &Variable, context: &Context) -> Result<Value, Error> {
    let a = u.evaluate(context)?.get_reals();
    let b = v.evaluate(context)?.get_reals();
    if a.len() != b.len() {
        return Err(Error::mismatch(format!(
            "cannot take the scalar product of {} and {} reals",
            a.len(),
            b.len()
        )));
    }

    Ok(Value::Real(a.iter().zip(&b).map(|(x, y)| x * y).sum()))
}

/// The first derivative with respect to one input is the other input, the mixed second
/// derivative is the identity and all other derivatives are zero.
pub(super) fn derivative(
    u: &Variable,
    v: &Variable,
    total: &mut DerivativeMatrix,
    context: &Context,
) -> Result<(), Error> {
    let a = u.evaluate(context)?.get_reals();
    let b = v.evaluate(context)?.get_reals();
    let n = a.len();
    if b.len() != n {
        return Err(Error::mismatch(format!(
            "cannot differentiate the scalar product of {} and {} reals",
            n,
            b.len()
        )));
    }

    // how often each independent variable is u and v
    let roles: Vec<(usize, usize)> = total
        .independent_variables()
        .iter()
        .map(|x| (x.same_variable(u) as usize, x.same_variable(v) as usize))
        .collect();

    for (i, m) in total.matrices_mut().iter_mut().enumerate() {
        let positions = mask_positions(i + 1);
        match positions.as_slice() {
            [p] => {
                let (is_u, is_v) = roles[*p];
                if is_u + is_v == 0 {
                    continue;
                }
                m.check_shape(1, n)?;
                for k in 0..n {
                    m[(0, k)] = is_u as f64 * b[k] + is_v as f64 * a[k];
                }
            }
            [p, q] => {
                let (pu, pv) = roles[*p];
                let (qu, qv) = roles[*q];
                let scale = (pu * qv + pv * qu) as f64;
                if scale != 0. {
                    m.check_shape(1, n * n)?;
                    for k in 0..n {
                        m[(0, k * n + k)] = scale;
                    }
                }
            }
            _ => {}
        }
    }

    Ok(())
}
