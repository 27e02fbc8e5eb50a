use linfa::dataset::Dataset;
use linfa::traits::Fit;
use linfa_elasticnet::ElasticNet;
use log::debug;
use ndarray::{s, Array1, Array2, Axis};

use crate::defaults::{DEFAULT_CD_MAX_ITER, DEFAULT_CD_TOL, ZERO_COEF_EPS};
use crate::features::hstack;
use crate::ols::fit_linear;
use crate::projection::Projector;
use crate::types::{ChangepointError, LassoSettings};

/// Ratio between consecutive penalties on the selection path (20 per decade).
const PATH_RATIO: f64 = 0.891_250_938_133_745_6;
/// The selection path never goes below `lambda_max * PATH_FLOOR`.
const PATH_FLOOR: f64 = 1e-6;

/// Result of an adaptive lasso fit with a free (unpenalized) block.
#[derive(Clone, Debug)]
pub(crate) struct AdaptiveLassoFit {
    /// Penalized coefficients on the raw column scale.
    pub beta: Vec<f64>,
    /// Unpenalized coefficients; index 0 is the intercept.
    pub gamma: Vec<f64>,
    /// Penalty used on the standardized problem.
    pub lambda: f64,
    /// Smallest penalty that zeroes every penalized coefficient.
    pub lambda_max: f64,
}

/// Scale columns to unit mean square. Returns the scaled matrix, the scales
/// and a mask of columns carrying any signal.
fn standardize(x: &Array2<f64>) -> (Array2<f64>, Vec<f64>, Vec<bool>) {
    let (n, p) = x.dim();
    let mut x_std = x.clone();
    let mut scales = vec![1.0; p];
    let mut live = vec![true; p];

    for (j, mut col) in x_std.axis_iter_mut(Axis(1)).enumerate() {
        let ms = col.iter().map(|v| v * v).sum::<f64>() / n.max(1) as f64;
        let std = ms.sqrt();
        if std > 1e-12 {
            col /= std;
            scales[j] = std;
        } else {
            col.fill(0.0);
            live[j] = false;
        }
    }

    (x_std, scales, live)
}

fn slice_columns(x: &Array2<f64>, selected: &[usize]) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((x.nrows(), selected.len()));
    for (dest_idx, &src_idx) in selected.iter().enumerate() {
        out.column_mut(dest_idx).assign(&x.column(src_idx));
    }
    out
}

/// lambda_max = max_j |x_j^T y| / n
fn lambda_max(x: &Array2<f64>, y: &Array1<f64>) -> f64 {
    let n = x.nrows().max(1) as f64;
    x.axis_iter(Axis(1))
        .map(|col| col.dot(y).abs() / n)
        .fold(0.0, f64::max)
}

fn build_lambda_grid(lambda_max: f64, len: usize) -> Vec<f64> {
    let lambda_max = if lambda_max <= 1e-12 { 1.0 } else { lambda_max };
    let lambda_min = lambda_max * 1e-3;
    let k = len.max(2);
    let log_max = lambda_max.ln();
    let step = (lambda_min.ln() - log_max) / (k as f64 - 1.0);
    (0..k).map(|i| (log_max + step * i as f64).exp()).collect()
}

/// Plain lasso without intercept, solved by Linfa's coordinate descent.
fn lasso_solve(x: &Array2<f64>, y: &Array1<f64>, lambda: f64) -> Result<Vec<f64>, ChangepointError> {
    if x.ncols() == 0 || lambda >= lambda_max(x, y) {
        return Ok(vec![0.0; x.ncols()]);
    }
    let dataset = Dataset::new(x.clone(), y.clone());
    let model = ElasticNet::<f64>::params()
        .penalty(lambda)
        .l1_ratio(1.0)
        .with_intercept(false)
        .max_iterations(DEFAULT_CD_MAX_ITER)
        .tolerance(DEFAULT_CD_TOL)
        .fit(&dataset)
        .map_err(|e| ChangepointError::Linalg(format!("{:?}", e)))?;
    let beta = model.hyperplane().to_vec();
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(ChangepointError::Linalg(
            "lasso produced non-finite coefficients".to_string(),
        ));
    }
    Ok(beta)
}

/// The standardized, adaptively weighted lasso problem left after the free
/// block (intercept included) is projected out.
struct Prepared {
    projector: Projector,
    /// Weighted live columns.
    x: Array2<f64>,
    /// Residual target scaled to unit RMS.
    y: Array1<f64>,
    /// Penalized column index of each live column.
    live_idx: Vec<usize>,
    /// Maps a scaled coefficient of each live column back to the raw scale.
    factors: Vec<f64>,
    /// Total number of penalized columns.
    p: usize,
    lambda_max: f64,
}

impl Prepared {
    fn new(
        free: &Array2<f64>,
        penalized: &Array2<f64>,
        y: &Array1<f64>,
        settings: &LassoSettings,
    ) -> Result<Self, ChangepointError> {
        let n = y.len();
        let p = penalized.ncols();
        let projector = Projector::new(free)?;
        let y_res = projector.residualize(y.view());
        let y_scale = (y_res.dot(&y_res) / n.max(1) as f64).sqrt();
        let y_mag = y.iter().map(|v| v.abs()).fold(1.0, f64::max);

        if p == 0 || y_scale <= 1e-12 * y_mag {
            debug!("nothing left to explain after the unpenalized block");
            return Ok(Self {
                projector,
                x: Array2::zeros((n, 0)),
                y: Array1::zeros(n),
                live_idx: Vec::new(),
                factors: Vec::new(),
                p,
                lambda_max: 0.0,
            });
        }

        let y_std = &y_res / y_scale;
        let (x_std, scales, live) = standardize(&projector.residualize_columns(penalized));
        let live_idx: Vec<usize> = (0..p).filter(|&j| live[j]).collect();
        let x_live = slice_columns(&x_std, &live_idx);

        // Initial estimate on a per-observation ridge scale.
        let init = fit_linear(
            &x_live,
            &y_std,
            settings.initial_estimator,
            settings.initial_ridge_lambda * n as f64,
            false,
        )?;
        let weights: Vec<f64> = init.coeffs.iter().map(|b| b.abs()).collect();

        let mut x_adaptive = x_live;
        for (mut col, &w) in x_adaptive.axis_iter_mut(Axis(1)).zip(weights.iter()) {
            col *= w;
        }
        let factors = live_idx
            .iter()
            .zip(weights.iter())
            .map(|(&j, &w)| w / scales[j] * y_scale)
            .collect();
        let lam_max = lambda_max(&x_adaptive, &y_std);

        Ok(Self {
            projector,
            x: x_adaptive,
            y: y_std,
            live_idx,
            factors,
            p,
            lambda_max: lam_max,
        })
    }

    /// Raw-scale coefficients of a plain lasso solve at `lambda`.
    fn solve(&self, lambda: f64) -> Result<Vec<f64>, ChangepointError> {
        let scaled = lasso_solve(&self.x, &self.y, lambda)?;
        let mut beta = vec![0.0; self.p];
        for (k, &j) in self.live_idx.iter().enumerate() {
            beta[j] = scaled[k] * self.factors[k];
        }
        Ok(beta)
    }

    /// Coefficients retained along the penalty path from `lambda_max` down to `lambda`.
    ///
    /// The path points are `lambda_max * PATH_RATIO^k`, the same for every
    /// `lambda`, so the retained set only grows as `lambda` decreases. A
    /// coefficient is retained once it has been non-zero at some point of the
    /// path and keeps its most recent non-zero value.
    fn path_select(&self, lambda: f64) -> Result<Vec<f64>, ChangepointError> {
        let mut beta = vec![0.0; self.p];
        let floor = lambda.max(self.lambda_max * PATH_FLOOR);
        let mut step = self.lambda_max * PATH_RATIO;
        let mut solves = 0usize;
        while step >= floor && step > 0.0 {
            for (j, b) in self.solve(step)?.into_iter().enumerate() {
                if b.abs() > ZERO_COEF_EPS {
                    beta[j] = b;
                }
            }
            step *= PATH_RATIO;
            solves += 1;
        }
        debug!("selection path: {solves} penalties down to {floor:.6}");
        Ok(beta)
    }

    /// Free-block coefficients given penalized coefficients `beta`.
    fn gamma(&self, penalized: &Array2<f64>, y: &Array1<f64>, beta: &[f64]) -> Vec<f64> {
        let remainder = y - &penalized.dot(&Array1::from(beta.to_vec()));
        self.projector.coefficients(remainder.view()).to_vec()
    }
}

fn with_intercept(unpenalized: &Array2<f64>) -> Array2<f64> {
    let ones = Array2::<f64>::ones((unpenalized.nrows(), 1));
    hstack(&[&ones, unpenalized])
}

/// Validation RMSE of each penalty in `lambdas`, one row per usable fold.
///
/// Rolling origin: fold `k` trains on the first `(k + 1)` spans and
/// validates on the next. The projection, standardization and adaptive
/// weights are rebuilt from each fold's training rows alone. Folds whose
/// training rows cannot support the free block are skipped.
fn cv_fold_errors(
    unpenalized: &Array2<f64>,
    penalized: &Array2<f64>,
    y: &Array1<f64>,
    settings: &LassoSettings,
    lambdas: &[f64],
    folds: usize,
) -> Result<Vec<Vec<f64>>, ChangepointError> {
    if folds < 2 {
        return Err(ChangepointError::InvalidConfig(
            "time-series CV requires at least 2 folds".to_string(),
        ));
    }
    let n = y.len();
    if n <= 2 * (folds + 1) {
        return Err(ChangepointError::InsufficientData {
            needed: 2 * (folds + 1) + 1,
            got: n,
        });
    }

    let free = with_intercept(unpenalized);
    let fold_span = (n as f64 / (folds as f64 + 1.0)).floor() as usize;
    let min_span = 2.max(fold_span);
    let mut errors = Vec::with_capacity(folds);

    for fold in 0..folds {
        let train_end = (min_span * (fold + 1)).min(n - 1);
        let valid_end = ((fold + 2) * min_span).min(n);
        if train_end == 0 || valid_end <= train_end {
            continue;
        }

        let free_train = free.slice(s![0..train_end, ..]).to_owned();
        let pen_train = penalized.slice(s![0..train_end, ..]).to_owned();
        let y_train = y.slice(s![0..train_end]).to_owned();
        let prepared = match Prepared::new(&free_train, &pen_train, &y_train, settings) {
            Ok(prepared) => prepared,
            Err(ChangepointError::Linalg(msg)) => {
                debug!("skipping cv fold {fold}: {msg}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let free_valid = free.slice(s![train_end..valid_end, ..]);
        let pen_valid = penalized.slice(s![train_end..valid_end, ..]);
        let y_valid = y.slice(s![train_end..valid_end]);

        let mut row = Vec::with_capacity(lambdas.len());
        for &lambda in lambdas {
            let beta = prepared.solve(lambda)?;
            let gamma = prepared.gamma(&pen_train, &y_train, &beta);
            let preds = free_valid.dot(&Array1::from(gamma)) + pen_valid.dot(&Array1::from(beta));
            let se: f64 = preds
                .iter()
                .zip(y_valid.iter())
                .map(|(p, a)| (a - p) * (a - p))
                .sum();
            row.push((se / preds.len().max(1) as f64).sqrt());
        }
        errors.push(row);
    }

    Ok(errors)
}

/// Mean and standard error of the fold errors for each penalty.
fn summarize_cv(errors: &[Vec<f64>], n_lambdas: usize) -> (Vec<f64>, Vec<f64>) {
    let c = errors.len();
    let mut means = vec![f64::INFINITY; n_lambdas];
    let mut ses = vec![f64::INFINITY; n_lambdas];
    if c == 0 {
        return (means, ses);
    }
    for idx in 0..n_lambdas {
        let sum: f64 = errors.iter().map(|row| row[idx]).sum();
        let sq_sum: f64 = errors.iter().map(|row| row[idx] * row[idx]).sum();
        let mean = sum / c as f64;
        means[idx] = mean;
        if c > 1 {
            let variance = (sq_sum / c as f64) - mean * mean;
            ses[idx] = variance.max(0.0).sqrt() / (c as f64).sqrt();
        }
    }
    (means, ses)
}

/// Index of the chosen penalty; the grid runs from sparsest to densest.
fn pick_lambda(cv_mean: &[f64], cv_se: &[f64], one_se_rule: bool) -> usize {
    let mut best_idx = 0;
    for (idx, &rmse) in cv_mean.iter().enumerate() {
        if rmse < cv_mean[best_idx] {
            best_idx = idx;
        }
    }
    if !one_se_rule || cv_mean.is_empty() || !cv_se[best_idx].is_finite() {
        return best_idx;
    }
    let threshold = cv_mean[best_idx] + cv_se[best_idx];
    cv_mean
        .iter()
        .position(|&rmse| rmse <= threshold)
        .unwrap_or(best_idx)
}

/// Adaptive lasso on `penalized`, with an intercept and `unpenalized` left free.
///
/// The free block is projected out of the target and the penalized columns.
/// Penalized columns are standardized, weighted by the magnitude of a
/// preliminary ridge/OLS estimate, and passed to a plain lasso. `strength`
/// is the penalty on that standardized problem (target scaled to unit RMS);
/// `None` selects it by rolling time-series CV.
///
/// Coefficients are selected along a fixed penalty path from the point where
/// everything is zero down to `strength`, so a stronger penalty never retains
/// a coefficient that a weaker one drops.
pub(crate) fn adaptive_lasso(
    unpenalized: &Array2<f64>,
    penalized: &Array2<f64>,
    y: &Array1<f64>,
    settings: &LassoSettings,
    strength: Option<f64>,
) -> Result<AdaptiveLassoFit, ChangepointError> {
    let n = y.len();
    if unpenalized.nrows() != n || penalized.nrows() != n {
        return Err(ChangepointError::LengthMismatch);
    }
    if let Some(s) = strength {
        if !s.is_finite() || s < 0.0 {
            return Err(ChangepointError::InvalidConfig(format!(
                "regularization_strength must be a finite value >= 0, got {s}"
            )));
        }
    }
    if settings.initial_ridge_lambda < 0.0 {
        return Err(ChangepointError::InvalidConfig(
            "initial_ridge_lambda must be >= 0".to_string(),
        ));
    }

    let prepared = Prepared::new(&with_intercept(unpenalized), penalized, y, settings)?;
    let lambda = match strength {
        Some(s) => s,
        None if prepared.lambda_max <= 0.0 => 0.0,
        None => {
            let grid = build_lambda_grid(prepared.lambda_max, settings.lambda_path_len);
            let errors = cv_fold_errors(
                unpenalized,
                penalized,
                y,
                settings,
                &grid,
                settings.cv_folds,
            )?;
            if errors.is_empty() {
                return Err(ChangepointError::Linalg(
                    "no cross-validation fold could be fitted; set regularization_strength"
                        .to_string(),
                ));
            }
            let (cv_mean, cv_se) = summarize_cv(&errors, grid.len());
            let best = pick_lambda(&cv_mean, &cv_se, settings.one_se_rule);
            debug!(
                "cv picked lambda {:.6} (index {best} of {}, cv rmse {:.4}, {} folds)",
                grid[best],
                grid.len(),
                cv_mean[best],
                errors.len()
            );
            grid[best]
        }
    };

    let beta = prepared.path_select(lambda)?;
    let gamma = prepared.gamma(penalized, y, &beta);

    debug!(
        "adaptive lasso: lambda {:.6} (max {:.6}), {} of {} penalized coefficients non-zero",
        lambda,
        prepared.lambda_max,
        beta.iter().filter(|b| **b != 0.0).count(),
        prepared.p
    );

    Ok(AdaptiveLassoFit {
        beta,
        gamma,
        lambda,
        lambda_max: prepared.lambda_max,
    })
}
