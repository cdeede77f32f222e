use crate::{error::Error, value::Value};

use super::{Variable, VariableKind};

impl Variable {
    /// Make the variable a leaf holding `value`.
    pub fn set_independent(&self, value: Value) -> Result<(), Error> {
        if let Value::DerivativeMatrix(_) = value {
            return Err(Error::invalid(format!(
                "{} cannot hold a derivative matrix",
                self
            )));
        }

        self.set_kind(VariableKind::Independent(value))
    }

    /// Get the stored value of a leaf.
    pub fn get_independent(&self) -> Option<Value> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::Independent(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Overwrite the stored value of a leaf with a value of the same type.
    pub(crate) fn store_value(&self, value: &Value) -> Result<(), Error> {
        match self.0.kind.borrow_mut().as_mut() {
            Some(VariableKind::Independent(v)) => v.copy_from(value),
            _ => Err(Error::invalid(format!("{} is not an independent variable", self))),
        }
    }
}

/// Distribute `reals` over `leaves`, giving each leaf a value of its own type.
pub(crate) fn split_over_leaves(
    leaves: &[Variable],
    reals: &[f64],
) -> Result<Vec<(Variable, Value)>, Error> {
    let mut res = Vec::with_capacity(leaves.len());
    let mut offset = 0;
    for l in leaves {
        let template = l
            .get_independent()
            .ok_or_else(|| Error::invalid(format!("{} is not an independent variable", l)))?;
        let n = template.number_of_reals();
        if offset + n > reals.len() {
            return Err(Error::mismatch(format!(
                "{} reals do not cover the independent variables",
                reals.len()
            )));
        }

        res.push((l.clone(), template.from_reals_like(&reals[offset..offset + n])?));
        offset += n;
    }

    if offset != reals.len() {
        return Err(Error::mismatch(format!(
            "expected {} reals for the independent variables, found {}",
            offset,
            reals.len()
        )));
    }

    Ok(res)
}

#[cfg(test)]
mod test {
    use super::split_over_leaves;
    use crate::{error::Error, matrix::Matrix, value::Value, variable::Variable};

    #[test]
    fn split() {
        let a = Variable::new("a");
        a.set_independent(Value::Real(0.)).unwrap();
        let m = Variable::new("m");
        m.set_independent(Value::Matrix(Matrix::new(2, 2))).unwrap();

        let s = split_over_leaves(&[a.clone(), m.clone()], &[1., 2., 3., 4., 5.]).unwrap();
        assert_eq!(s[0].1, Value::Real(1.));
        assert_eq!(
            s[1].1,
            Value::Matrix(Matrix::from_linear(vec![2., 3., 4., 5.], 2, 2).unwrap())
        );

        assert!(matches!(
            split_over_leaves(&[a.clone(), m.clone()], &[1., 2.]),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            split_over_leaves(&[a], &[1., 2.]),
            Err(Error::TypeMismatch(_))
        ));
    }
}
