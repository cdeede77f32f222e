//! Evaluation and arbitrary-order differentiation of composed variables.
//!
//! A [Variable](variable::Variable) is an expression node, such as an independent
//! variable, a concatenation of variables, a coordinate transformation or a function
//! composition. Variables can be evaluated to a [Value](value::Value) and differentiated
//! to any order with respect to any list of other variables. All partial derivatives are
//! packed in a [DerivativeMatrix](derivative_matrix::DerivativeMatrix), and derivatives of
//! compositions are assembled by the multivariate chain rule.
//!
//! For example:
//!
//! ```
//! use computed_variable::{context::Context, value::Value, variable::Variable};
//!
//! let u = Variable::new("u");
//! u.set_independent(Value::RealVector(vec![1., 2.])).unwrap();
//! let v = Variable::new("v");
//! v.set_independent(Value::RealVector(vec![3., 4.])).unwrap();
//!
//! let d = Variable::new("d");
//! d.set_dot_product(&u, &v).unwrap();
//!
//! let ctx = Context::default();
//! assert_eq!(d.evaluate(&ctx).unwrap(), Value::Real(11.));
//!
//! let du = d.evaluate_derivative(&[u.clone()], &ctx).unwrap();
//! assert_eq!(du.matrices()[0].data(), &[3., 4.]);
//! ```

pub mod chain_rule;
pub mod combinatorics;
pub mod context;
pub mod derivative_matrix;
pub mod error;
pub mod matrix;
pub mod settings;
pub mod value;
pub mod variable;

pub use context::Context;
pub use derivative_matrix::DerivativeMatrix;
pub use error::Error;
pub use settings::Settings;
pub use value::{Value, ValueKind};
pub use variable::Variable;
