//! The multivariate chain rule for derivative matrices of arbitrary order.
//!
//! Let `y = g(x)` with `x = (x_0, .., x_{k-1})` and `h = f(y)`. For a subset `S` of the
//! independent variables, the generalized Faa di Bruno formula reads
//!
//! ```text
//! d^S h = sum over partitions {B_0, .., B_j} of S:
//!             sum over p in m^(j+1): d^(j+1) f / dy_p0 .. dy_pj * prod_l d^(B_l) g_pl
//! ```
//!
//! where `m` is the size of `y`. Every unordered partition is visited once, with its
//! blocks in canonical order (see [SetPartitionIterator]).

use tracing::debug;

use crate::{
    combinatorics::SetPartitionIterator,
    derivative_matrix::{join_column, mask_positions, split_column, DerivativeMatrix, Digits},
    error::Error,
    matrix::MatrixError,
};

impl DerivativeMatrix {
    /// Add the derivative of the composition `f(g(x))` to `self`.
    ///
    /// `g` is the derivative of `y` with respect to the independent variables of `self`,
    /// and `f` is the derivative of the dependent variable of `self` with respect to `order`
    /// copies of `y`, so that its block `2^(j+1) - 1` holds the derivative of order `j + 1`
    /// with columns `p_0, .., p_j`, where `p_0` varies slowest.
    ///
    /// The derivatives of `f` are assumed to be symmetric, i.e. the order of differentiation does
    /// not matter. A partition is visited once, in canonical order, irrespective of how many
    /// orderings of its blocks exist, so the result is only correct if the mixed partial
    /// derivatives of `f` commute.
    ///
    /// On an error `self` may be partially updated.
    pub fn multiply_and_accumulate(
        &mut self,
        f: &DerivativeMatrix,
        g: &DerivativeMatrix,
    ) -> Result<(), Error> {
        let order = self.order();
        if f.order() != order || g.order() != order {
            return Err(Error::invalid(format!(
                "cannot combine derivatives of order {} and {} into order {}",
                f.order(),
                g.order(),
                order
            )));
        }

        for (x, y) in self
            .independent_variables()
            .iter()
            .zip(g.independent_variables())
        {
            if !x.same_variable(y) {
                return Err(Error::invalid(format!(
                    "the inner derivative is taken with respect to {} instead of {}",
                    y, x
                )));
            }
        }

        let nrows = self.number_of_rows();
        let m = g.number_of_rows();
        let sizes = self.independent_sizes();

        // validate all dimensions before changing anything
        let mut fcols: usize = 1;
        for j in 0..order {
            fcols = fcols
                .checked_mul(m)
                .ok_or_else(|| Error::invalid("the intermediate derivative is too large"))?;
            f.matrices()[(1 << (j + 1)) - 2].check_shape(nrows, fcols)?;
        }
        for (total, inner) in self.matrices().iter().zip(g.matrices()) {
            inner.check_shape(m, total.ncols())?;
        }
        if g.independent_sizes() != sizes {
            return Err(MatrixError::ShapeMismatch {
                expected: (m, sizes.iter().product()),
                found: (m, g.independent_sizes().iter().product()),
            }
            .into());
        }

        debug!(
            "Chain rule of order {} with {} intermediate values",
            order, m
        );

        let mut digits = Digits::new();
        let mut block_digits = Digits::new();
        let mut block_radices = Digits::new();
        let mut weights: Vec<f64> = vec![];
        let mut next_weights: Vec<f64> = vec![];
        let mut inner_masks = Digits::new();
        let mut inner_columns = Digits::new();

        for total_index in 0..self.matrices().len() {
            let mask = total_index + 1;
            let positions = mask_positions(mask);
            let radices: Digits = positions.iter().map(|p| sizes[*p]).collect();
            let ncols = self.matrices()[total_index].ncols();

            for blocks in 1..=positions.len() {
                let f_block = &f.matrices()[(1 << blocks) - 2];

                let mut partitions = SetPartitionIterator::new(positions.len(), blocks);
                while let Some(partition) = partitions.next() {
                    inner_masks.clear();
                    for b in partition {
                        inner_masks.push(b.iter().fold(0, |acc, e| acc | (1 << positions[*e])));
                    }

                    for col in 0..ncols {
                        split_column(col, &radices, &mut digits);

                        // the column of every inner block, restricted to the variables of the block
                        inner_columns.clear();
                        for b in partition {
                            block_digits.clear();
                            block_radices.clear();
                            for e in b {
                                block_digits.push(digits[*e]);
                                block_radices.push(radices[*e]);
                            }
                            inner_columns.push(join_column(&block_digits, &block_radices));
                        }

                        // the products of the inner derivatives for every (p_0, .., p_j)
                        weights.clear();
                        weights.push(1.);
                        for (inner_mask, inner_col) in inner_masks.iter().zip(&inner_columns) {
                            let inner = &g.matrices()[inner_mask - 1];
                            next_weights.clear();
                            for w in &weights {
                                for p in 0..m {
                                    next_weights.push(w * inner[(p, *inner_col)]);
                                }
                            }
                            std::mem::swap(&mut weights, &mut next_weights);
                        }

                        if weights.iter().all(|w| *w == 0.) {
                            continue;
                        }

                        let total = &mut self.matrices_mut()[total_index];
                        for row in 0..nrows {
                            let mut sum = 0.;
                            for (p, w) in weights.iter().enumerate() {
                                if *w != 0. {
                                    sum += f_block[(row, p)] * w;
                                }
                            }
                            total[(row, col)] += sum;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use crate::{
        derivative_matrix::DerivativeMatrix, error::Error, matrix::Matrix, value::Value,
        variable::Variable,
    };

    fn leaf(name: &str, n: usize) -> Variable {
        let v = Variable::new(name);
        if n == 1 {
            v.set_independent(Value::Real(0.)).unwrap();
        } else {
            v.set_independent(Value::RealVector(vec![0.; n])).unwrap();
        }
        v
    }

    fn scalar_blocks(d: &DerivativeMatrix, values: &[f64]) -> DerivativeMatrix {
        d.with_reals(values).unwrap()
    }

    #[test]
    fn scalar_faa_di_bruno() {
        // h = f(g(x)) with f = exp, g = sin at x: f^(n) = e^g
        let x = leaf("x", 1);
        let y = leaf("y", 1);
        let h = leaf("h", 1);

        let x0: f64 = 0.3;
        let (s, c) = x0.sin_cos();
        let e = s.exp();

        let order = 3;
        let xs = vec![x.clone(); order];
        let ys = vec![y.clone(); order];

        // blocks ordered by mask: 1, 2, 3, 4, 5, 6, 7
        let g_derivs = |mask: usize| match mask.count_ones() {
            1 => c,
            2 => -s,
            _ => -c,
        };
        let g_reals: Vec<f64> = (1..8).map(g_derivs).collect();
        let f_reals = vec![e; 7];

        let g = scalar_blocks(&DerivativeMatrix::zeros(&y, &xs).unwrap(), &g_reals);
        let f = scalar_blocks(&DerivativeMatrix::zeros(&h, &ys).unwrap(), &f_reals);
        let mut total = DerivativeMatrix::zeros(&h, &xs).unwrap();
        total.multiply_and_accumulate(&f, &g).unwrap();

        let first = e * c;
        let second = e * (c * c - s);
        let third = e * (c * c * c - 3. * s * c - c);
        for (i, m) in total.matrices().iter().enumerate() {
            let expected = match (i + 1).count_ones() {
                1 => first,
                2 => second,
                _ => third,
            };
            assert_relative_eq!(m[(0, 0)], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn vector_second_order() {
        // y = g(x) = (x_0 x_1, x_0 + x_1), h = f(y) = y_0 y_1 at x = (2, 3)
        let x = leaf("x", 2);
        let y = leaf("y", 2);
        let h = leaf("h", 1);
        let (x0, x1) = (2., 3.);
        let (y0, y1) = (x0 * x1, x0 + x1);

        let mut g = DerivativeMatrix::zeros(&y, &[x.clone(), x.clone()]).unwrap();
        let jac = Matrix::from_nested_vec(vec![vec![x1, x0], vec![1., 1.]]).unwrap();
        g.matrices_mut()[0] = jac.clone();
        g.matrices_mut()[1] = jac;
        g.matrices_mut()[2] =
            Matrix::from_nested_vec(vec![vec![0., 1., 1., 0.], vec![0.; 4]]).unwrap();

        let mut f = DerivativeMatrix::zeros(&h, &[y.clone(), y.clone()]).unwrap();
        let grad = Matrix::from_nested_vec(vec![vec![y1, y0]]).unwrap();
        f.matrices_mut()[0] = grad.clone();
        f.matrices_mut()[1] = grad;
        f.matrices_mut()[2] = Matrix::from_nested_vec(vec![vec![0., 1., 1., 0.]]).unwrap();

        let mut total = DerivativeMatrix::zeros(&h, &[x.clone(), x.clone()]).unwrap();
        total.multiply_and_accumulate(&f, &g).unwrap();

        // h = x_0^2 x_1 + x_0 x_1^2
        let dh = [2. * x0 * x1 + x1 * x1, x0 * x0 + 2. * x0 * x1];
        let d2h = [2. * x1, 2. * x0 + 2. * x1, 2. * x0 + 2. * x1, 2. * x0];
        assert_eq!(total.matrices()[0].data(), &dh);
        assert_eq!(total.matrices()[1].data(), &dh);
        assert_eq!(total.matrices()[2].data(), &d2h);
    }

    #[test]
    fn accumulates() {
        let x = leaf("x", 1);
        let y = leaf("y", 1);
        let h = leaf("h", 1);

        let g = scalar_blocks(&DerivativeMatrix::zeros(&y, &[x.clone()]).unwrap(), &[2.]);
        let f = scalar_blocks(&DerivativeMatrix::zeros(&h, &[y.clone()]).unwrap(), &[3.]);
        let mut total = scalar_blocks(&DerivativeMatrix::zeros(&h, &[x.clone()]).unwrap(), &[1.]);
        total.multiply_and_accumulate(&f, &g).unwrap();
        total.multiply_and_accumulate(&f, &g).unwrap();
        assert_eq!(total.matrices()[0].data(), &[13.]);
    }

    #[test]
    fn mismatches() {
        let x = leaf("x", 2);
        let z = leaf("z", 2);
        let y = leaf("y", 3);
        let h = leaf("h", 1);

        let g = DerivativeMatrix::zeros(&y, &[x.clone()]).unwrap();
        let f = DerivativeMatrix::zeros(&h, &[y.clone()]).unwrap();

        let mut total = DerivativeMatrix::zeros(&h, &[x.clone(), x.clone()]).unwrap();
        assert!(matches!(
            total.multiply_and_accumulate(&f, &g),
            Err(Error::InvalidArgument(_))
        ));

        let mut total = DerivativeMatrix::zeros(&h, &[z.clone()]).unwrap();
        assert!(matches!(
            total.multiply_and_accumulate(&f, &g),
            Err(Error::InvalidArgument(_))
        ));

        // f is not a derivative with respect to something of the size of y
        let f = DerivativeMatrix::zeros(&h, &[x.clone()]).unwrap();
        let mut total = DerivativeMatrix::zeros(&h, &[x.clone()]).unwrap();
        assert!(matches!(
            total.multiply_and_accumulate(&f, &g),
            Err(Error::Matrix(_))
        ));
        assert!(total.is_zero());
    }
}
