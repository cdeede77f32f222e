use crate::error::Error;

use super::{Variable, VariableKind};

impl Variable {
    /// Make the variable an alias of `variable`. The identity evaluates to the value of
    /// `variable` and is the same variable for differentiation.
    pub fn set_identity(&self, variable: &Variable) -> Result<(), Error> {
        self.set_kind(VariableKind::Identity(variable.clone()))
    }

    pub fn get_identity(&self) -> Option<Variable> {
        match self.0.kind.borrow().as_ref() {
            Some(VariableKind::Identity(w)) => Some(w.clone()),
            _ => None,
        }
    }
}
