//! The evaluation context: settings and substituted values of independent variables.

use std::rc::Rc;

use ahash::HashMap;

use crate::{error::Error, settings::Settings, value::Value, variable::Variable};

/// The context of an evaluation.
///
/// A context carries the [Settings] and a map of overridden values of independent
/// variables. The map is never changed in place: [Context::with_overrides] returns a
/// new context, so a substitution is visible exactly to the evaluations that receive
/// the extended context.
#[derive(Clone, Default)]
pub struct Context {
    settings: Settings,
    overrides: Rc<HashMap<usize, (Variable, Value)>>,
}

impl Context {
    pub fn new(settings: Settings) -> Context {
        Context {
            settings,
            overrides: Rc::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the overridden value of `variable`, if any.
    pub fn override_value(&self, variable: &Variable) -> Option<&Value> {
        self.overrides.get(&variable.id()).map(|(_, v)| v)
    }

    /// The number of overridden variables.
    pub fn number_of_overrides(&self) -> usize {
        self.overrides.len()
    }

    /// Create a new context in which the independent variables in `overrides` take the
    /// given values. Existing overrides of the same variables are replaced.
    ///
    /// Every value must have the type and size of the stored value of its variable.
    pub fn with_overrides(
        &self,
        overrides: impl IntoIterator<Item = (Variable, Value)>,
    ) -> Result<Context, Error> {
        let mut map = (*self.overrides).clone();
        for (var, value) in overrides {
            let Some(stored) = var.get_independent() else {
                return Err(Error::invalid(format!(
                    "cannot override {}, which is not an independent variable",
                    var
                )));
            };

            if !stored.same_type(&value) {
                return Err(Error::mismatch(format!(
                    "cannot override {} holding a {} of {} reals with a {} of {} reals",
                    var,
                    stored.kind(),
                    stored.number_of_reals(),
                    value.kind(),
                    value.number_of_reals()
                )));
            }

            map.insert(var.id(), (var, value));
        }

        Ok(Context {
            settings: self.settings.clone(),
            overrides: Rc::new(map),
        })
    }
}

#[cfg(test)]
mod test {
    use super::Context;
    use crate::{error::Error, value::Value, variable::Variable};

    #[test]
    fn overrides_are_scoped() {
        let x = Variable::new("x");
        x.set_independent(Value::Real(1.)).unwrap();
        let y = Variable::new("y");
        y.set_independent(Value::Real(2.)).unwrap();

        let outer = Context::default();
        let inner = outer.with_overrides([(x.clone(), Value::Real(5.))]).unwrap();
        let innermost = inner
            .with_overrides([(x.clone(), Value::Real(6.)), (y.clone(), Value::Real(7.))])
            .unwrap();

        assert!(outer.override_value(&x).is_none());
        assert_eq!(inner.override_value(&x), Some(&Value::Real(5.)));
        assert_eq!(innermost.override_value(&x), Some(&Value::Real(6.)));
        assert_eq!(innermost.number_of_overrides(), 2);

        assert_eq!(x.evaluate(&outer).unwrap(), Value::Real(1.));
        assert_eq!(x.evaluate(&inner).unwrap(), Value::Real(5.));
        assert_eq!(y.evaluate(&innermost).unwrap(), Value::Real(7.));
        assert_eq!(x.get_independent(), Some(Value::Real(1.)));
    }

    #[test]
    fn overrides_must_match_the_stored_value() {
        let u = Variable::new("u");
        u.set_independent(Value::RealVector(vec![1., 2.])).unwrap();
        let d = Variable::new("d");
        d.set_dot_product(&u, &u).unwrap();

        let ctx = Context::default();
        assert!(matches!(
            ctx.with_overrides([(u.clone(), Value::RealVector(vec![1., 2., 3.]))]),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            ctx.with_overrides([(u.clone(), Value::Real(1.))]),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            ctx.with_overrides([(d.clone(), Value::Real(1.))]),
            Err(Error::InvalidArgument(_))
        ));

        let bound = ctx
            .with_overrides([(u.clone(), Value::RealVector(vec![3., 4.]))])
            .unwrap();
        assert_eq!(d.evaluate(&bound).unwrap(), Value::Real(25.));
        let du = d.evaluate_derivative(&[u.clone()], &bound).unwrap();
        assert_eq!(du.matrices()[0].data(), &[6., 8.]);
    }
}
