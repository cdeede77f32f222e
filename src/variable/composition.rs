//! Function composition: a dependent variable evaluated with the values of source
//! variables substituted for some of its independent variables.
//!
//! The derivative of `h(x) = f(g(x), x)` is obtained from the derivative of
//! `f` with respect to `y = (placeholders, x)`, taken with the sources substituted,
//! and the derivative of `(g(x), x)` with respect to `x`, which are combined by
//! [DerivativeMatrix::multiply_and_accumulate].

use tracing::debug;

use crate::{
    context::Context, derivative_matrix::DerivativeMatrix, error::Error, value::Value,
};

use super::{independent::split_over_leaves, Variable, VariableKind};

/// A dependent variable with source variables substituted for independent variables.
#[derive(Clone)]
pub(crate) struct Composition {
    pub(crate) dependent: Variable,
    /// Pairs of an independent variable of `dependent` and its source.
    pub(crate) pairs: Vec<(Variable, Variable)>,
}

impl Variable {
    /// Make the variable the composition of `dependent` with the sources in `pairs`:
    /// each pair `(independent, source)` substitutes the value of `source` for `independent`.
    ///
    /// Every `independent` must be an independent variable or a composite of independent
    /// variables, and must have as many values as its source.
    pub fn set_composition(
        &self,
        dependent: &Variable,
        pairs: Vec<(Variable, Variable)>,
    ) -> Result<(), Error> {
        for (i, (independent, source)) in pairs.iter().enumerate() {
            check_substitution(independent, source)?;

            if pairs[..i].iter().any(|(x, _)| x.overlaps(independent)) {
                return Err(Error::invalid(format!(
                    "{} is substituted more than once",
                    independent
                )));
            }
        }

        self.set_kind(VariableKind::Composition(Composition {
            dependent: dependent.clone(),
            pairs,
        }))
    }

    pub fn get_composition(&self) -> Option<(Variable, Vec<(Variable, Variable)>)> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::Composition(c)) => Some((c.dependent.clone(), c.pairs.clone())),
            _ => None,
        }
    }

    /// Substitute `source` for `independent` in a composition, replacing an earlier
    /// source of the same independent variable. With `None` the substitution is removed.
    ///
    /// On failure the substitutions are left unchanged.
    pub fn set_source_variable(
        &self,
        independent: &Variable,
        source: Option<&Variable>,
    ) -> Result<(), Error> {
        let composition = match self.kind()? {
            VariableKind::Composition(c) => c,
            k => {
                return Err(Error::invalid(format!(
                    "{} is a {} and not a composition",
                    self,
                    k.type_string()
                )))
            }
        };

        let position = composition
            .pairs
            .iter()
            .position(|(x, _)| x.same_variable(independent));

        let Some(source) = source else {
            let Some(p) = position else {
                return Err(Error::invalid(format!(
                    "{} has no source in {}",
                    independent, self
                )));
            };

            if let Some(VariableKind::Composition(c)) = self.0.kind.borrow_mut().as_mut() {
                c.pairs.remove(p);
            }
            return Ok(());
        };

        check_substitution(independent, source)?;

        if source.ptr_eq(self) || source.depends_on(self) {
            return Err(Error::CyclicDependency(format!(
                "{} would depend on itself through {}",
                self, source
            )));
        }

        if position.is_none()
            && composition
                .pairs
                .iter()
                .any(|(x, _)| x.overlaps(independent))
        {
            return Err(Error::invalid(format!(
                "{} overlaps a substituted variable of {}",
                independent, self
            )));
        }

        if let Some(VariableKind::Composition(c)) = self.0.kind.borrow_mut().as_mut() {
            match position {
                Some(p) => c.pairs[p].1 = source.clone(),
                None => c.pairs.push((independent.clone(), source.clone())),
            }
        }

        Ok(())
    }
}

fn check_substitution(independent: &Variable, source: &Variable) -> Result<(), Error> {
    independent.leaves()?;

    let (n, m) = (independent.number_of_values()?, source.number_of_values()?);
    if n != m {
        return Err(Error::mismatch(format!(
            "cannot substitute {} with {} values for {} with {} values",
            source, m, independent, n
        )));
    }

    Ok(())
}

impl Composition {
    pub(super) fn children(&self) -> Vec<Variable> {
        let mut c = vec![self.dependent.clone()];
        for (i, s) in &self.pairs {
            c.push(i.clone());
            c.push(s.clone());
        }
        c
    }

    /// Create the context in which the independent variables take the values of the sources.
    fn bind(&self, context: &Context) -> Result<Context, Error> {
        let mut overrides = vec![];
        for (independent, source) in &self.pairs {
            let value = source.evaluate(context)?;
            let leaves = independent.leaves()?;
            overrides.extend(split_over_leaves(&leaves, &value.get_reals())?);
        }

        context.with_overrides(overrides)
    }

    pub(super) fn evaluate(&self, context: &Context) -> Result<Value, Error> {
        let bound = self.bind(context)?;
        self.dependent.evaluate(&bound)
    }

    /// Differentiate the composition `variable` with respect to `independent_variables`,
    /// none of which is a composite.
    pub(super) fn derivative(
        &self,
        variable: &Variable,
        independent_variables: &[Variable],
        context: &Context,
    ) -> Result<DerivativeMatrix, Error> {
        let mut placeholders = vec![];
        for (i, _) in &self.pairs {
            placeholders.extend(i.leaves()?);
        }

        // a requested variable that is also substituted only acts through the sources,
        // so the dependent sees an unrelated leaf in its place
        let mut unique: Vec<Variable> = vec![];
        let mut targets: Vec<Variable> = vec![];
        for x in independent_variables {
            if unique.iter().any(|u| u.same_variable(x)) {
                continue;
            }

            if placeholders.iter().any(|p| x.overlaps(p)) {
                let hidden = Variable::anonymous();
                hidden.set_independent(Value::RealVector(vec![0.; x.number_of_values()?]))?;
                targets.push(hidden);
            } else {
                targets.push(x.clone());
            }
            unique.push(x.clone());
        }

        // the inner function (sources, x) and the matching arguments (placeholders, x) of the outer
        let inner = Variable::anonymous();
        inner.set_composite(
            self.pairs
                .iter()
                .map(|(_, s)| s.clone())
                .chain(unique)
                .collect(),
        )?;
        let arguments = Variable::anonymous();
        arguments.set_composite(
            self.pairs
                .iter()
                .map(|(i, _)| i.clone())
                .chain(targets)
                .collect(),
        )?;

        debug!(
            "Differentiating the sources of {} with respect to {} variables",
            variable,
            independent_variables.len()
        );
        let g = inner.evaluate_derivative(independent_variables, context)?;

        debug!("Differentiating {} with substituted sources", self.dependent);
        let bound = self.bind(context)?;
        let f = self
            .dependent
            .evaluate_derivative(&vec![arguments; independent_variables.len()], &bound)?;

        let mut total = DerivativeMatrix::zeros(variable, independent_variables)?;
        total.multiply_and_accumulate(&f, &g)?;
        debug!("Accumulated the chain rule for {}", variable);

        Ok(total)
    }
}
