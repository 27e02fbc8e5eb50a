//! Projection onto the unpenalized block of a regression design.
//!
//! An L1 penalty that only touches some columns leaves the others free; fitting
//! the penalized columns on data with the free block projected out gives the
//! same penalized coefficients as the joint problem.

use linfa_linalg::qr::QR;
use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::types::ChangepointError;

const RANK_TOL: f64 = 1e-10;

/// Thin Householder QR factorisation `U = QR` of the unpenalized block.
#[derive(Clone, Debug)]
pub(crate) struct Projector {
    q: Array2<f64>,
    r: Array2<f64>,
}

impl Projector {
    /// Factorise `u`.
    ///
    /// # Errors
    /// `Linalg` if a column is (numerically) a combination of earlier ones.
    pub fn new(u: &Array2<f64>) -> Result<Self, ChangepointError> {
        let (n, p) = u.dim();
        if p > n {
            return Err(ChangepointError::Linalg(format!(
                "unpenalized design has {p} columns but only {n} rows"
            )));
        }
        let (q, r) = u
            .qr()
            .map_err(|e| ChangepointError::Linalg(e.to_string()))?
            .into_decomp();

        for (j, col) in u.axis_iter(Axis(1)).enumerate() {
            let scale = col.dot(&col).sqrt().max(1.0);
            if r[[j, j]].abs() <= RANK_TOL * scale {
                return Err(ChangepointError::Linalg(format!(
                    "unpenalized design is rank deficient at column {j}; \
                     reduce the seasonality order or use a coarser resample frequency"
                )));
            }
        }
        Ok(Self { q, r })
    }

    /// `v` minus its projection onto the column space of `U`.
    pub fn residualize(&self, v: ArrayView1<f64>) -> Array1<f64> {
        let coef = self.q.t().dot(&v);
        &v - &self.q.dot(&coef)
    }

    pub fn residualize_columns(&self, x: &Array2<f64>) -> Array2<f64> {
        x - &self.q.dot(&self.q.t().dot(x))
    }

    /// Least-squares coefficients of `y` on `U`.
    pub fn coefficients(&self, y: ArrayView1<f64>) -> Array1<f64> {
        let qty = self.q.t().dot(&y);
        let p = qty.len();
        let mut gamma = Array1::<f64>::zeros(p);
        for i in (0..p).rev() {
            let mut acc = qty[i];
            for k in (i + 1)..p {
                acc -= self.r[[i, k]] * gamma[k];
            }
            gamma[i] = acc / self.r[[i, i]];
        }
        gamma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    use crate::ols::fit_linear;
    use crate::types::Estimator;

    #[test]
    fn test_recovers_exact_coefficients() {
        let u = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![2.0, 5.0, 8.0, 11.0];
        let proj = Projector::new(&u).unwrap();
        let gamma = proj.coefficients(y.view());
        assert_relative_eq!(gamma[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(gamma[1], 3.0, epsilon = 1e-10);
        let res = proj.residualize(y.view());
        assert!(res.iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn test_residual_is_orthogonal() {
        let u = array![[1.0, 0.5], [1.0, -1.0], [1.0, 2.0], [1.0, 0.0], [1.0, 1.5]];
        let x = array![[1.0], [4.0], [-2.0], [0.5], [3.0]];
        let proj = Projector::new(&u).unwrap();
        let res = proj.residualize_columns(&x);
        for j in 0..u.ncols() {
            assert_relative_eq!(u.column(j).dot(&res.column(0)), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_matches_least_squares_fit() {
        let u = array![
            [1.0, 0.0, 0.3],
            [1.0, 1.0, -0.8],
            [1.0, 2.0, 0.5],
            [1.0, 3.0, 1.1],
            [1.0, 4.0, -0.2],
            [1.0, 5.0, 0.9]
        ];
        let y = array![1.2, 2.9, 5.4, 7.0, 8.1, 11.3];
        let gamma = Projector::new(&u).unwrap().coefficients(y.view());
        let fit = fit_linear(&u, &y, Estimator::Ols, 0.0, false).unwrap();
        assert_relative_eq!(fit.intercept, 0.0, epsilon = 1e-12);
        for (g, c) in gamma.iter().zip(&fit.coeffs) {
            assert_relative_eq!(*g, *c, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_rank_deficient_is_descriptive() {
        let u = array![[1.0, 2.0], [1.0, 2.0], [1.0, 2.0]];
        let err = Projector::new(&u).unwrap_err();
        assert!(matches!(err, ChangepointError::Linalg(ref m) if m.contains("rank deficient")));
    }
}
