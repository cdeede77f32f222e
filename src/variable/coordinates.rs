//! Prolate spheroidal to rectangular cartesian coordinates:
//!
//! ```text
//! x = f cosh(lambda) cos(mu)
//! y = f sinh(lambda) sin(mu) cos(theta)
//! z = f sinh(lambda) sin(mu) sin(theta)
//! ```

use tracing::info;

use crate::{
    context::Context,
    derivative_matrix::{mask_positions, split_column, DerivativeMatrix, Digits},
    error::Error,
    value::Value,
};

use super::{Variable, VariableKind};

impl Variable {
    /// Make the variable the rectangular cartesian position of the prolate spheroidal
    /// `coordinates` `(lambda, mu, theta)` with focus `focus`. Both must be independent
    /// variables, with 3 and 1 reals.
    pub fn set_prolate_spheroidal_to_rectangular_cartesian(
        &self,
        coordinates: &Variable,
        focus: &Variable,
    ) -> Result<(), Error> {
        check_leaf(coordinates, 3)?;
        check_leaf(focus, 1)?;

        self.set_kind(VariableKind::ProlateSpheroidalToRectangularCartesian {
            coordinates: coordinates.clone(),
            focus: focus.clone(),
        })
    }

    pub fn get_prolate_spheroidal_to_rectangular_cartesian(&self) -> Option<(Variable, Variable)> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::ProlateSpheroidalToRectangularCartesian { coordinates, focus }) => {
                Some((coordinates.clone(), focus.clone()))
            }
            _ => None,
        }
    }
}

/// Check that `variable` is an independent variable with `n` reals.
pub(super) fn check_leaf(variable: &Variable, n: usize) -> Result<(), Error> {
    match variable.get_independent() {
        Some(v) if v.number_of_reals() == n => Ok(()),
        Some(v) => Err(Error::mismatch(format!(
            "{} must have {} reals, found {}",
            variable,
            n,
            v.number_of_reals()
        ))),
        None if variable.is_typed() => Err(Error::mismatch(format!(
            "{} must be an independent variable",
            variable
        ))),
        None => Err(Error::invalid(format!("{} has no type", variable))),
    }
}

fn inputs(
    coordinates: &Variable,
    focus: &Variable,
    context: &Context,
) -> Result<([f64; 3], f64), Error> {
    let c = coordinates.evaluate(context)?.get_reals();
    let f = focus.evaluate(context)?.get_reals();
    match (c.as_slice(), f.as_slice()) {
        ([lambda, mu, theta], [focus]) => Ok(([*lambda, *mu, *theta], *focus)),
        _ => Err(Error::mismatch(
            "prolate spheroidal coordinates need 3 coordinates and 1 focus",
        )),
    }
}

pub(super) fn evaluate(
    coordinates: &Variable,
    focus: &Variable,
    context: &Context,
) -> Result<Value, Error> {
    let ([lambda, mu, theta], focus) = inputs(coordinates, focus, context)?;

    Ok(Value::RealVector(vec![
        focus * lambda.cosh() * mu.cos(),
        focus * lambda.sinh() * mu.sin() * theta.cos(),
        focus * lambda.sinh() * mu.sin() * theta.sin(),
    ]))
}

/// The `n`th derivative of `cosh` if `hyperbolic`, else of `cos`.
fn d_cos(n: usize, x: f64, hyperbolic: bool) -> f64 {
    if hyperbolic {
        if n % 2 == 0 {
            x.cosh()
        } else {
            x.sinh()
        }
    } else {
        match n % 4 {
            0 => x.cos(),
            1 => -x.sin(),
            2 => -x.cos(),
            _ => x.sin(),
        }
    }
}

/// The `n`th derivative of `sinh` if `hyperbolic`, else of `sin`.
fn d_sin(n: usize, x: f64, hyperbolic: bool) -> f64 {
    if hyperbolic {
        if n % 2 == 0 {
            x.sinh()
        } else {
            x.cosh()
        }
    } else {
        match n % 4 {
            0 => x.sin(),
            1 => x.cos(),
            2 => -x.sin(),
            _ => -x.cos(),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Role {
    Coordinates,
    Focus,
    Unrelated,
}

/// Fill the blocks with derivatives up to second order in the coordinates. The position is
/// linear in the focus.
pub(super) fn derivative(
    coordinates: &Variable,
    focus: &Variable,
    total: &mut DerivativeMatrix,
    context: &Context,
) -> Result<(), Error> {
    let ([lambda, mu, theta], f) = inputs(coordinates, focus, context)?;

    let roles: Vec<Role> = total
        .independent_variables()
        .iter()
        .map(|x| {
            if x.same_variable(coordinates) {
                Role::Coordinates
            } else if x.same_variable(focus) {
                Role::Focus
            } else {
                Role::Unrelated
            }
        })
        .collect();

    let mut digits = Digits::new();
    for (i, m) in total.matrices_mut().iter_mut().enumerate() {
        let positions = mask_positions(i + 1);
        let block_roles: Vec<Role> = positions.iter().map(|p| roles[*p]).collect();

        if block_roles.contains(&Role::Unrelated) {
            continue;
        }

        let focus_order = block_roles.iter().filter(|r| **r == Role::Focus).count();
        let coordinate_order = block_roles.len() - focus_order;
        if focus_order > 1 {
            continue;
        }

        if coordinate_order > 2 {
            info!(
                "Derivatives of order {} in prolate spheroidal coordinates are not implemented",
                coordinate_order
            );
            if context.settings().unimplemented_as_zero {
                continue;
            }
            return Err(Error::Unimplemented(format!(
                "derivative of order {} in prolate spheroidal coordinates",
                coordinate_order
            )));
        }

        let radices: Digits = block_roles
            .iter()
            .map(|r| if *r == Role::Coordinates { 3 } else { 1 })
            .collect();
        let scale = if focus_order == 1 { 1. } else { f };

        for col in 0..m.ncols() {
            split_column(col, &radices, &mut digits);

            let mut orders = [0; 3];
            for (r, d) in block_roles.iter().zip(&digits) {
                if *r == Role::Coordinates {
                    orders[*d] += 1;
                }
            }
            let [a, b, c] = orders;

            m[(0, col)] = if c == 0 {
                scale * d_cos(a, lambda, true) * d_cos(b, mu, false)
            } else {
                0.
            };
            let radial = scale * d_sin(a, lambda, true) * d_sin(b, mu, false);
            m[(1, col)] = radial * d_cos(c, theta, false);
            m[(2, col)] = radial * d_sin(c, theta, false);
        }
    }

    Ok(())
}
