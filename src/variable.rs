//! Variables: expression nodes that can be evaluated and differentiated.
//!
//! A [Variable] is a shared handle. It is created untyped and receives its kind from
//! exactly one successful `set_*` call, for example [Variable::set_independent] for a leaf
//! or [Variable::set_composition] for a function composition. Every `set_*` has a matching
//! `get_*` accessor.
//!
//! ```
//! use computed_variable::{context::Context, value::Value, variable::Variable};
//!
//! let x = Variable::new("x");
//! x.set_independent(Value::Real(3.)).unwrap();
//! let y = Variable::new("y");
//! y.set_independent(Value::Real(0.)).unwrap();
//!
//! // f(y) = y^2 and g(x) = 1 + 2x
//! let f = Variable::new("f");
//! f.set_polynomial(&y, vec![0., 0., 1.]).unwrap();
//! let g = Variable::new("g");
//! g.set_polynomial(&x, vec![1., 2.]).unwrap();
//!
//! let h = Variable::new("h");
//! h.set_composition(&f, vec![(y.clone(), g.clone())]).unwrap();
//!
//! let ctx = Context::default();
//! assert_eq!(h.evaluate(&ctx).unwrap(), Value::Real(49.));
//! let d = h.evaluate_derivative(&[x.clone()], &ctx).unwrap();
//! assert_eq!(d.matrices()[0][(0, 0)], 28.);
//! ```

mod composite;
mod composition;
mod coordinates;
mod derivative;
mod dot_product;
mod identity;
mod independent;
mod polynomial;

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    rc::Rc,
};

use ahash::HashSet;
use smartstring::{LazyCompact, SmartString};
use tracing::instrument;

use crate::{
    context::Context,
    derivative_matrix::{join_column, mask_positions, split_column, DerivativeMatrix, Digits},
    error::Error,
    matrix::Matrix,
    value::{Value, ValueKind},
};

pub(crate) use composition::Composition;

/// A named or anonymous expression node.
///
/// Cloning a variable clones the handle: both clones refer to the same node.
#[derive(Clone)]
pub struct Variable(Rc<VariableData>);

struct VariableData {
    name: Option<SmartString<LazyCompact>>,
    kind: RefCell<Option<VariableKind>>,
}

/// The kinds of variables.
#[derive(Clone)]
pub(crate) enum VariableKind {
    /// A leaf holding a value.
    Independent(Value),
    Identity(Variable),
    /// The concatenation of the reals of the parts.
    Composite(Vec<Variable>),
    Composition(Composition),
    ProlateSpheroidalToRectangularCartesian {
        coordinates: Variable,
        focus: Variable,
    },
    DotProduct {
        u: Variable,
        v: Variable,
    },
    Polynomial {
        input: Variable,
        coefficients: Vec<f64>,
    },
    Derivative {
        dependent: Variable,
        independent_variables: Vec<Variable>,
    },
}

impl VariableKind {
    fn type_string(&self) -> &'static str {
        match self {
            VariableKind::Independent(_) => "independent",
            VariableKind::Identity(_) => "identity",
            VariableKind::Composite(_) => "composite",
            VariableKind::Composition(_) => "composition",
            VariableKind::ProlateSpheroidalToRectangularCartesian { .. } => {
                "prolate_spheroidal_to_rectangular_cartesian"
            }
            VariableKind::DotProduct { .. } => "dot_product",
            VariableKind::Polynomial { .. } => "polynomial",
            VariableKind::Derivative { .. } => "derivative",
        }
    }

    /// The variables this kind refers to.
    fn children(&self) -> Vec<Variable> {
        match self {
            VariableKind::Independent(_) => vec![],
            VariableKind::Identity(w) => vec![w.clone()],
            VariableKind::Composite(parts) => parts.clone(),
            VariableKind::Composition(c) => c.children(),
            VariableKind::ProlateSpheroidalToRectangularCartesian { coordinates, focus } => {
                vec![coordinates.clone(), focus.clone()]
            }
            VariableKind::DotProduct { u, v } => vec![u.clone(), v.clone()],
            VariableKind::Polynomial { input, .. } => vec![input.clone()],
            VariableKind::Derivative {
                dependent,
                independent_variables,
            } => {
                let mut c = vec![dependent.clone()];
                c.extend(independent_variables.iter().cloned());
                c
            }
        }
    }
}

impl Variable {
    /// Create a new untyped variable called `name`.
    pub fn new(name: &str) -> Variable {
        Variable(Rc::new(VariableData {
            name: Some(name.into()),
            kind: RefCell::new(None),
        }))
    }

    /// Create a new untyped variable without a name.
    pub fn anonymous() -> Variable {
        Variable(Rc::new(VariableData {
            name: None,
            kind: RefCell::new(None),
        }))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// An identifier that is unique among all living variables.
    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Return true iff both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Return true iff the type has been set.
    pub fn is_typed(&self) -> bool {
        self.0.kind.borrow().is_some()
    }

    /// The name of the type of the variable, or `None` if it is untyped.
    pub fn type_string(&self) -> Option<&'static str> {
        self.0.kind.borrow().as_ref().map(|k| k.type_string())
    }

    /// Get a copy of the kind.
    pub(crate) fn kind(&self) -> Result<VariableKind, Error> {
        self.0
            .kind
            .borrow()
            .clone()
            .ok_or_else(|| Error::invalid(format!("{} has no type", self)))
    }

    /// Give the variable its type. This fails if the type is already set or if
    /// the variable would depend on itself.
    pub(crate) fn set_kind(&self, kind: VariableKind) -> Result<(), Error> {
        if let Some(k) = self.0.kind.borrow().as_ref() {
            return Err(Error::invalid(format!(
                "{} already has type {}",
                self,
                k.type_string()
            )));
        }

        for c in kind.children() {
            if c.ptr_eq(self) || c.depends_on(self) {
                return Err(Error::CyclicDependency(format!(
                    "{} would depend on itself through {}",
                    self, c
                )));
            }
        }

        *self.0.kind.borrow_mut() = Some(kind);
        Ok(())
    }

    /// The variables that this variable refers to directly.
    pub fn children(&self) -> Vec<Variable> {
        self.0
            .kind
            .borrow()
            .as_ref()
            .map(|k| k.children())
            .unwrap_or_default()
    }

    /// Return true iff `other` can be reached from `self` by following references.
    pub fn depends_on(&self, other: &Variable) -> bool {
        let mut visited = HashSet::default();
        let mut stack = self.children();
        while let Some(c) = stack.pop() {
            if c.ptr_eq(other) {
                return true;
            }
            if visited.insert(c.id()) {
                stack.extend(c.children());
            }
        }
        false
    }

    /// Follow identity variables to the variable they wrap.
    pub(crate) fn unwrap_identity(&self) -> Variable {
        let mut v = self.clone();
        loop {
            let next = match v.0.kind.borrow().as_ref() {
                Some(VariableKind::Identity(w)) => w.clone(),
                _ => break,
            };
            v = next;
        }
        v
    }

    /// Get the parts if the variable is a composite, looking through identities.
    pub(crate) fn composite_parts(&self) -> Option<Vec<Variable>> {
        let v = self.unwrap_identity();
        let kind = v.0.kind.borrow();
        match kind.as_ref() {
            Some(VariableKind::Composite(parts)) => Some(parts.clone()),
            _ => None,
        }
    }

    /// Return true iff `self` and `other` represent the same variable.
    ///
    /// Identities are the same variable as the variable they wrap, composites are the
    /// same if their parts are and derivatives are the same if they differentiate the
    /// same variables. All other variables are only the same as themselves.
    pub fn same_variable(&self, other: &Variable) -> bool {
        let a = self.unwrap_identity();
        let b = other.unwrap_identity();
        if a.ptr_eq(&b) {
            return true;
        }

        let (ka, kb) = (a.0.kind.borrow(), b.0.kind.borrow());
        match (ka.as_ref(), kb.as_ref()) {
            (Some(VariableKind::Composite(p1)), Some(VariableKind::Composite(p2))) => {
                p1.len() == p2.len() && p1.iter().zip(p2).all(|(x, y)| x.same_variable(y))
            }
            (
                Some(VariableKind::Derivative {
                    dependent: d1,
                    independent_variables: i1,
                }),
                Some(VariableKind::Derivative {
                    dependent: d2,
                    independent_variables: i2,
                }),
            ) => {
                d1.same_variable(d2)
                    && i1.len() == i2.len()
                    && i1.iter().zip(i2).all(|(x, y)| x.same_variable(y))
            }
            _ => false,
        }
    }

    /// Return true iff `self` and `other` share reals, i.e. they are the same variable or
    /// a part of a composite overlaps the other variable.
    pub fn overlaps(&self, other: &Variable) -> bool {
        if self.same_variable(other) {
            return true;
        }

        if let Some(parts) = self.composite_parts() {
            if parts.iter().any(|p| p.overlaps(other)) {
                return true;
            }
        }

        if let Some(parts) = other.composite_parts() {
            if parts.iter().any(|p| self.overlaps(p)) {
                return true;
            }
        }

        false
    }

    /// The kind of value the variable evaluates to.
    pub fn value_kind(&self) -> Result<ValueKind, Error> {
        Ok(match self.kind()? {
            VariableKind::Independent(v) => v.kind(),
            VariableKind::Identity(w) => w.value_kind()?,
            VariableKind::Composition(c) => c.dependent.value_kind()?,
            VariableKind::Polynomial { .. } | VariableKind::DotProduct { .. } => ValueKind::Real,
            VariableKind::Composite(_)
            | VariableKind::ProlateSpheroidalToRectangularCartesian { .. } => {
                ValueKind::RealVector
            }
            VariableKind::Derivative { .. } => ValueKind::DerivativeMatrix,
        })
    }

    /// The number of reals the variable evaluates to.
    pub fn number_of_values(&self) -> Result<usize, Error> {
        Ok(match self.kind()? {
            VariableKind::Independent(v) => v.number_of_reals(),
            VariableKind::Identity(w) => w.number_of_values()?,
            VariableKind::Composite(parts) => {
                let mut n = 0;
                for p in &parts {
                    n += p.number_of_values()?;
                }
                n
            }
            VariableKind::Composition(c) => c.dependent.number_of_values()?,
            VariableKind::ProlateSpheroidalToRectangularCartesian { .. } => 3,
            VariableKind::DotProduct { .. } | VariableKind::Polynomial { .. } => 1,
            VariableKind::Derivative {
                dependent,
                independent_variables,
            } => derivative::number_of_values(&dependent, &independent_variables)?,
        })
    }

    /// Return true iff the variable and everything it refers to is typed.
    pub fn is_defined(&self) -> bool {
        match self.0.kind.borrow().as_ref() {
            None => false,
            Some(k) => k.children().iter().all(|c| c.is_defined()),
        }
    }

    /// Evaluate the variable.
    #[instrument(level = "trace", skip_all, fields(variable = %self))]
    pub fn evaluate(&self, context: &Context) -> Result<Value, Error> {
        match self.kind()? {
            VariableKind::Independent(v) => {
                Ok(context.override_value(self).cloned().unwrap_or(v))
            }
            VariableKind::Identity(w) => w.evaluate(context),
            VariableKind::Composite(parts) => composite::evaluate(&parts, context),
            VariableKind::Composition(c) => c.evaluate(context),
            VariableKind::ProlateSpheroidalToRectangularCartesian { coordinates, focus } => {
                coordinates::evaluate(&coordinates, &focus, context)
            }
            VariableKind::DotProduct { u, v } => dot_product::evaluate(&u, &v, context),
            VariableKind::Polynomial {
                input,
                coefficients,
            } => polynomial::evaluate(&input, &coefficients, context),
            VariableKind::Derivative {
                dependent,
                independent_variables,
            } => Ok(Value::DerivativeMatrix(
                dependent.evaluate_derivative(&independent_variables, context)?,
            )),
        }
    }

    /// Compute all partial derivatives of the variable with respect to `independent_variables`,
    /// whose length is the order of the derivative. Repeated variables denote higher derivatives.
    ///
    /// The derivative with respect to the variable itself is the identity, and all higher
    /// derivatives with respect to itself are zero. Composite independent variables are
    /// differentiated part by part.
    #[instrument(
        level = "trace",
        skip_all,
        fields(variable = %self, order = independent_variables.len())
    )]
    pub fn evaluate_derivative(
        &self,
        independent_variables: &[Variable],
        context: &Context,
    ) -> Result<DerivativeMatrix, Error> {
        let order = independent_variables.len();
        if order == 0 {
            return Err(Error::invalid("the order of a derivative must be positive"));
        }
        if order > context.settings().max_order {
            return Err(Error::invalid(format!(
                "the order {} exceeds the maximum order {}",
                order,
                context.settings().max_order
            )));
        }

        let kind = self.kind()?;
        let nrows = self.number_of_values()?;
        let mut sizes = Digits::with_capacity(order);
        for x in independent_variables {
            let n = x.number_of_values()?;
            if n == 0 {
                return Err(Error::invalid(format!(
                    "cannot differentiate with respect to {}, which has no values",
                    x
                )));
            }
            sizes.push(n);
        }

        if independent_variables.iter().any(|x| x.same_variable(self)) {
            return self.derivative_including_self(independent_variables, nrows, &sizes, context);
        }

        if independent_variables
            .iter()
            .any(|x| x.composite_parts().is_some())
        {
            return self.derivative_by_parts(independent_variables, nrows, &sizes, context);
        }

        let mut d =
            DerivativeMatrix::zeros_with_sizes(self, independent_variables, nrows, &sizes)?;
        match kind {
            VariableKind::Independent(_) => {}
            VariableKind::Identity(w) => {
                d = w
                    .evaluate_derivative(independent_variables, context)?
                    .with_dependent(self);
            }
            VariableKind::Composite(parts) => composite::derivative(&parts, &mut d, context)?,
            VariableKind::Composition(c) => {
                d = c.derivative(self, independent_variables, context)?;
            }
            VariableKind::ProlateSpheroidalToRectangularCartesian { coordinates, focus } => {
                coordinates::derivative(&coordinates, &focus, &mut d, context)?
            }
            VariableKind::DotProduct { u, v } => dot_product::derivative(&u, &v, &mut d, context)?,
            VariableKind::Polynomial {
                input,
                coefficients,
            } => polynomial::derivative(&input, &coefficients, &mut d, context)?,
            VariableKind::Derivative {
                dependent,
                independent_variables: inner,
            } => derivative::derivative(&dependent, &inner, &mut d, context)?,
        }

        Ok(d)
    }

    /// Differentiate with respect to a list that contains the variable itself. Blocks of a
    /// single occurrence of the variable are the identity, blocks of the variable and
    /// anything else are zero and the remaining blocks come from the other variables.
    fn derivative_including_self(
        &self,
        independent_variables: &[Variable],
        nrows: usize,
        sizes: &[usize],
        context: &Context,
    ) -> Result<DerivativeMatrix, Error> {
        let mut self_mask = 0;
        let mut rest = vec![];
        let mut rest_positions = Digits::new();
        for (i, x) in independent_variables.iter().enumerate() {
            if x.same_variable(self) {
                if sizes[i] != nrows {
                    return Err(Error::mismatch(format!(
                        "{} has {} values but {} has {}",
                        self, nrows, x, sizes[i]
                    )));
                }
                self_mask |= 1 << i;
            } else {
                rest.push(x.clone());
                rest_positions.push(i);
            }
        }

        let rest_derivative = if rest.is_empty() {
            None
        } else {
            Some(self.evaluate_derivative(&rest, context)?)
        };

        let mut d = DerivativeMatrix::zeros_with_sizes(self, independent_variables, nrows, sizes)?;
        for (i, m) in d.matrices_mut().iter_mut().enumerate() {
            let mask = i + 1;
            if mask & self_mask != 0 {
                if mask.count_ones() == 1 {
                    *m = Matrix::identity(nrows);
                }
            } else if let Some(r) = &rest_derivative {
                let mut rest_mask = 0;
                for (j, p) in rest_positions.iter().enumerate() {
                    if mask & (1 << p) != 0 {
                        rest_mask |= 1 << j;
                    }
                }
                *m = r.matrices()[rest_mask - 1].clone();
            }
        }

        Ok(d)
    }

    /// Differentiate with respect to a list containing composites by differentiating with
    /// respect to every choice of parts and scattering the blocks into the columns of
    /// the composites.
    fn derivative_by_parts(
        &self,
        independent_variables: &[Variable],
        nrows: usize,
        sizes: &[usize],
        context: &Context,
    ) -> Result<DerivativeMatrix, Error> {
        // (part, offset, size) for every independent variable
        let mut parts: Vec<Vec<(Variable, usize, usize)>> = vec![];
        for x in independent_variables {
            let mut flat = vec![];
            let mut offset = 0;
            for p in x.flatten_composite() {
                let n = p.number_of_values()?;
                if n > 0 {
                    flat.push((p, offset, n));
                    offset += n;
                }
            }
            parts.push(flat);
        }

        let counts: Digits = parts.iter().map(|p| p.len()).collect();
        let mut choices: usize = 1;
        for c in &counts {
            choices = choices
                .checked_mul(*c)
                .ok_or_else(|| Error::invalid("too many composite parts to differentiate"))?;
        }

        let mut d = DerivativeMatrix::zeros_with_sizes(self, independent_variables, nrows, sizes)?;

        let mut choice = Digits::new();
        let mut digits = Digits::new();
        for t in 0..choices {
            split_column(t, &counts, &mut choice);
            let chosen: Vec<Variable> = parts
                .iter()
                .zip(&choice)
                .map(|(p, c)| p[*c].0.clone())
                .collect();
            let sub = self.evaluate_derivative(&chosen, context)?;

            for (i, m) in d.matrices_mut().iter_mut().enumerate() {
                let mask = i + 1;
                // every block is taken from the first choice for the variables outside of it
                if choice
                    .iter()
                    .enumerate()
                    .any(|(p, c)| mask & (1 << p) == 0 && *c != 0)
                {
                    continue;
                }

                let positions = mask_positions(mask);
                let sub_radices: Digits = positions
                    .iter()
                    .map(|p| parts[*p][choice[*p]].2)
                    .collect();
                let full_radices: Digits = positions.iter().map(|p| sizes[*p]).collect();
                let offsets: Digits = positions.iter().map(|p| parts[*p][choice[*p]].1).collect();

                let src = &sub.matrices()[i];
                for sc in 0..src.ncols() {
                    split_column(sc, &sub_radices, &mut digits);
                    for (digit, o) in digits.iter_mut().zip(&offsets) {
                        *digit += o;
                    }
                    let fc = join_column(&digits, &full_radices);
                    for r in 0..nrows {
                        m[(r, fc)] = src[(r, sc)];
                    }
                }
            }
        }

        Ok(d)
    }

    /// Expand composites, looking through identities, into their non-composite parts.
    pub(crate) fn flatten_composite(&self) -> Vec<Variable> {
        match self.composite_parts() {
            Some(parts) => parts.iter().flat_map(|p| p.flatten_composite()).collect(),
            None => vec![self.clone()],
        }
    }

    /// Expand the variable into the leaves that hold its reals. The variable must be an
    /// independent variable, or an identity or composite of independent variables.
    pub fn leaves(&self) -> Result<Vec<Variable>, Error> {
        match self.kind()? {
            VariableKind::Independent(_) => Ok(vec![self.clone()]),
            VariableKind::Identity(w) => w.leaves(),
            VariableKind::Composite(parts) => {
                let mut res = vec![];
                for p in &parts {
                    res.extend(p.leaves()?);
                }
                Ok(res)
            }
            k => Err(Error::invalid(format!(
                "{} is a {} and not an independent variable",
                self,
                k.type_string()
            ))),
        }
    }

    /// The leaves that the value of this variable depends on and that are not substituted.
    pub fn free_leaves(&self) -> Vec<Variable> {
        let mut res: Vec<Variable> = vec![];
        let mut add = |vars: Vec<Variable>| {
            for v in vars {
                if !res.iter().any(|r| r.ptr_eq(&v)) {
                    res.push(v);
                }
            }
        };

        match self.0.kind.borrow().clone() {
            None => {}
            Some(VariableKind::Independent(_)) => add(vec![self.clone()]),
            Some(VariableKind::Composition(c)) => {
                let bound: Vec<Variable> = c
                    .pairs
                    .iter()
                    .flat_map(|(i, _)| i.leaves().unwrap_or_default())
                    .collect();
                add(c
                    .dependent
                    .free_leaves()
                    .into_iter()
                    .filter(|l| !bound.iter().any(|b| b.ptr_eq(l)))
                    .collect());
                for (_, s) in &c.pairs {
                    add(s.free_leaves());
                }
            }
            Some(VariableKind::Derivative { dependent, .. }) => add(dependent.free_leaves()),
            Some(k) => {
                for c in k.children() {
                    add(c.free_leaves());
                }
            }
        }

        res
    }

    /// Return true iff the value of `dependent` depends on the reals of `self`, which
    /// must be an independent variable or a composite of independent variables.
    pub fn is_independent_variable_of(&self, dependent: &Variable) -> bool {
        let leaves = match self.leaves() {
            Ok(l) if !l.is_empty() => l,
            _ => return false,
        };

        let free = dependent.free_leaves();
        leaves.iter().all(|l| free.iter().any(|f| f.ptr_eq(l)))
    }

    /// Get the stored value of the independent variable `independent` of `self`.
    pub fn get_independent_variable_value(&self, independent: &Variable) -> Result<Value, Error> {
        if !independent.is_independent_variable_of(self) {
            return Err(Error::invalid(format!(
                "{} is not an independent variable of {}",
                independent, self
            )));
        }

        independent.evaluate(&Context::default())
    }

    /// Set the stored value of the independent variable `independent` of `self`.
    /// The value must have the type of `independent`, or for a composite, the same number of reals.
    pub fn set_independent_variable_value(
        &self,
        independent: &Variable,
        value: &Value,
    ) -> Result<(), Error> {
        if !independent.is_independent_variable_of(self) {
            return Err(Error::invalid(format!(
                "{} is not an independent variable of {}",
                independent, self
            )));
        }

        let leaves = independent.leaves()?;
        if let [leaf] = leaves.as_slice() {
            return leaf.store_value(value);
        }

        let assignment = independent::split_over_leaves(&leaves, &value.get_reals())?;
        for (leaf, v) in &assignment {
            leaf.store_value(v)?;
        }
        Ok(())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(n) = self.name() {
            return f.write_str(n);
        }

        match self.0.kind.borrow().as_ref() {
            None => f.write_str("_"),
            Some(VariableKind::Identity(w)) => write!(f, "identity({})", w),
            Some(VariableKind::Composite(parts)) => {
                f.write_str("composite(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", p)?;
                }
                f.write_str(")")
            }
            Some(k) => write!(f, "_{}", k.type_string()),
        }
    }
}

impl Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Variable({})", self)
    }
}
