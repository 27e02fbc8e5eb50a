use linfa::dataset::Dataset;
use linfa::traits::Fit;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, Axis};

use crate::types::{ChangepointError, Estimator};

/// Coefficients of a plain linear fit.
#[derive(Clone, Debug)]
pub(crate) struct LinearFit {
    pub coeffs: Vec<f64>,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let beta = Array1::from(self.coeffs.clone());
        x.dot(&beta) + self.intercept
    }
}

/// Augment design matrix and target for ridge regression via Tikhonov method.
///
/// Implements ridge regression as: min ||[X; sqrt(λ)I]β - [y; 0]||²
/// This is equivalent to: min ||Xβ - y||² + λ||β||²
fn augment_for_ridge(x_raw: &Array2<f64>, y: &Array1<f64>, lambda: f64) -> (Array2<f64>, Array1<f64>) {
    if lambda <= 0.0 {
        return (x_raw.clone(), y.clone());
    }

    let (n, p) = x_raw.dim();
    let sqrt_l = lambda.sqrt();

    // X_aug = [X; sqrt(lambda)*I], y_aug = [y; 0]
    let mut x_aug = Array2::<f64>::zeros((n + p, p));
    x_aug.slice_mut(ndarray::s![0..n, ..]).assign(x_raw);
    for j in 0..p {
        x_aug[[n + j, j]] = sqrt_l;
    }

    let mut y_aug = Array1::<f64>::zeros(n + p);
    y_aug.slice_mut(ndarray::s![0..n]).assign(y);

    (x_aug, y_aug)
}

/// Least-squares or ridge fit of `y` on `x` using Linfa.
///
/// # Errors
/// `LengthMismatch` for misaligned inputs, `Linalg` when the solver fails
/// (typically a singular design under `Estimator::Ols`).
pub(crate) fn fit_linear(
    x: &Array2<f64>,
    y: &Array1<f64>,
    estimator: Estimator,
    ridge_lambda: f64,
    intercept: bool,
) -> Result<LinearFit, ChangepointError> {
    if x.nrows() != y.len() {
        return Err(ChangepointError::LengthMismatch);
    }
    if x.ncols() == 0 {
        let mean = if intercept { y.mean().unwrap_or(0.0) } else { 0.0 };
        return Ok(LinearFit {
            coeffs: Vec::new(),
            intercept: mean,
        });
    }

    if estimator == Estimator::Ridge && ridge_lambda > 0.0 && intercept {
        // Penalty rows must not reach the intercept: fit centred data
        // without one, then recover it from the means.
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| ChangepointError::Linalg("empty design".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_c = x - &x_mean;
        let y_c = y - y_mean;
        let centred = solve_linear(augment_for_ridge(&x_c, &y_c, ridge_lambda), false)?;
        let intercept = y_mean - x_mean.dot(&Array1::from(centred.coeffs.clone()));
        return Ok(LinearFit {
            coeffs: centred.coeffs,
            intercept,
        });
    }

    let design = match estimator {
        Estimator::Ridge => augment_for_ridge(x, y, ridge_lambda),
        Estimator::Ols => (x.clone(), y.clone()),
    };
    solve_linear(design, intercept)
}

fn solve_linear(
    (x, y): (Array2<f64>, Array1<f64>),
    intercept: bool,
) -> Result<LinearFit, ChangepointError> {
    let dataset = Dataset::new(x, y);
    let fitted = LinearRegression::new()
        .with_intercept(intercept)
        .fit(&dataset)
        .map_err(|e| ChangepointError::Linalg(format!("{:?}", e)))?;

    let coeffs = fitted.params().to_vec();
    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(ChangepointError::Linalg(
            "linear fit produced non-finite coefficients".to_string(),
        ));
    }
    Ok(LinearFit {
        coeffs,
        intercept: if intercept { fitted.intercept() } else { 0.0 },
    })
}

/// Compute RMSE and R² metrics.
pub(crate) fn compute_metrics(y_actual: &[f64], y_pred: &[f64]) -> (f64, f64) {
    let n = y_actual.len().max(1) as f64;

    let ss_res: f64 = y_actual
        .iter()
        .zip(y_pred.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    let rmse = (ss_res / n).sqrt();

    let y_mean = y_actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_actual.iter().map(|&v| (v - y_mean).powi(2)).sum();
    let r2 = 1.0 - ss_res / ss_tot.max(1e-12);

    (rmse, r2)
}
