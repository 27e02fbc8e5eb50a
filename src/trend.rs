//! Trend changepoint detection.
//!
//! The pipeline:
//!
//! 1. mean-aggregate the series to `resample_freq`, damping short-term noise
//!    and sub-period seasonality;
//! 2. place candidate changepoints evenly, keeping clear of the series tail
//!    where too little data remains to estimate a slope;
//! 3. fit intercept + growth + hinge columns with yearly Fourier terms
//!    alongside (yearly seasonality is too slow for aggregation to remove);
//!    only the hinges are penalized, by adaptive lasso;
//! 4. drop zero coefficients and thin out changepoints closer than
//!    `actual_changepoint_min_distance`;
//! 5. refit the trend on the survivors.

use chrono::NaiveDateTime;
use log::{debug, warn};
use ndarray::{Array1, Array2};

use crate::candidates::{place_candidates, CandidatePlan};
use crate::data::{Frame, TimeSeries};
use crate::defaults::{DEFAULT_TREND_RIDGE_LAMBDA, ZERO_COEF_EPS};
use crate::features::{continuous_times, fourier_terms, hinge_columns, hstack, year};
use crate::filter::post_filter;
use crate::freq::parse_duration;
use crate::lasso::adaptive_lasso;
use crate::ols::{compute_metrics, fit_linear};
use crate::resample::resample_mean;
use crate::types::{ChangepointError, TrendChangepoints, TrendConfig, TrendModel};

/// Detect trend changepoints in `value_col` of `frame`, indexed by `time_col`.
///
/// # Errors
/// Missing columns, invalid configuration (proportions outside `[0, 1)`,
/// malformed frequencies, negative strength), too few aggregated points for
/// the requested candidates, or a degenerate regression. A penalty strong
/// enough to remove every candidate is not an error: the result simply has
/// no changepoints.
///
/// # Example
/// ```
/// use chrono::{Duration, NaiveDate};
/// use trend_changepoint::{find_trend_changepoints, Frame, TrendConfig};
///
/// let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let ts: Vec<_> = (0..730).map(|d| start + Duration::days(d)).collect();
/// let y: Vec<f64> = (0..730)
///     .map(|d| if d < 365 { 0.1 * d as f64 } else { 36.5 - 0.05 * (d - 365) as f64 })
///     .collect();
/// let frame = Frame::new().with_time_column("ts", ts).with_numeric_column("y", y);
///
/// let config = TrendConfig {
///     regularization_strength: Some(0.01),
///     resample_freq: "7D".to_string(),
///     potential_changepoint_n: 20,
///     yearly_seasonality_order: 0,
///     ..Default::default()
/// };
/// let result = find_trend_changepoints(&frame, "ts", "y", &config).unwrap();
/// assert!(!result.changepoints.is_empty());
/// ```
pub fn find_trend_changepoints(
    frame: &Frame,
    time_col: &str,
    value_col: &str,
    config: &TrendConfig,
) -> Result<TrendChangepoints, ChangepointError> {
    let series = TimeSeries::from_frame(frame, time_col, value_col)?;
    detect_trend_changepoints(&series, config)
}

/// Same as [`find_trend_changepoints`] for an already extracted series.
pub fn detect_trend_changepoints(
    series: &TimeSeries,
    config: &TrendConfig,
) -> Result<TrendChangepoints, ChangepointError> {
    let freq = parse_duration(&config.resample_freq)?;
    let min_distance = parse_duration(&config.actual_changepoint_min_distance)?;
    let plan = CandidatePlan::from_trend(config)?;
    if let Some(s) = config.regularization_strength {
        if !s.is_finite() || s < 0.0 {
            return Err(ChangepointError::InvalidConfig(format!(
                "regularization_strength must be a finite value >= 0, got {s}"
            )));
        }
    }

    let aggregated = resample_mean(series, freq)?;
    let timestamps = aggregated.timestamps();
    let origin = aggregated.start();
    let ct = continuous_times(origin, timestamps);
    let y = Array1::from(aggregated.values().to_vec());

    let candidates = place_candidates(timestamps, &plan)?;

    let ct_col = Array2::from_shape_vec((ct.len(), 1), ct.clone())
        .map_err(|e| ChangepointError::Linalg(e.to_string()))?;
    let yearly = fourier_terms(origin, timestamps, year(), config.yearly_seasonality_order);
    let unpenalized = hstack(&[&ct_col, &yearly]);
    let hinges = hinge_columns(&ct, &candidates);

    let fit = adaptive_lasso(
        &unpenalized,
        &hinges,
        &y,
        &config.lasso,
        config.regularization_strength,
    )?;

    // trend part of the lasso fit: intercept + growth + hinges
    let adaptive_lasso_estimate: Vec<f64> = {
        let hinge_part = hinges.dot(&Array1::from(fit.beta.clone()));
        ct.iter()
            .zip(hinge_part.iter())
            .map(|(&t, &h)| fit.gamma[0] + fit.gamma[1] * t + h)
            .collect()
    };

    let nonzero: Vec<usize> = (0..candidates.len())
        .filter(|&k| fit.beta[k].abs() > ZERO_COEF_EPS)
        .collect();
    let nonzero_ts: Vec<NaiveDateTime> = nonzero.iter().map(|&k| timestamps[candidates[k]]).collect();
    let nonzero_coef: Vec<f64> = nonzero.iter().map(|&k| fit.beta[k]).collect();
    let kept = post_filter(&nonzero_ts, &nonzero_coef, min_distance, config.post_filter)?;

    let changepoint_indices: Vec<usize> = kept.iter().map(|&i| candidates[nonzero[i]]).collect();
    let changepoints: Vec<NaiveDateTime> = kept.iter().map(|&i| nonzero_ts[i]).collect();
    let coefficients: Vec<f64> = kept.iter().map(|&i| nonzero_coef[i]).collect();

    if changepoints.is_empty() {
        warn!(
            "no trend changepoints detected (regularization strength {:.6}, zeroing threshold {:.6}, {} candidates)",
            fit.lambda,
            fit.lambda_max,
            candidates.len()
        );
    } else {
        debug!(
            "{} candidates, {} non-zero, {} after post-filter",
            candidates.len(),
            nonzero.len(),
            changepoints.len()
        );
    }

    // refit on the survivors
    let final_hinges = hinge_columns(&ct, &changepoint_indices);
    let design = hstack(&[&ct_col, &final_hinges, &yearly]);
    let ridge_lambda = DEFAULT_TREND_RIDGE_LAMBDA * y.len() as f64;
    let refit = fit_linear(&design, &y, config.trend_estimator, ridge_lambda, true)?;

    let k = changepoint_indices.len();
    let trend_model = TrendModel {
        origin,
        intercept: refit.intercept,
        growth: refit.coeffs[0],
        changepoints: changepoint_indices
            .iter()
            .zip(refit.coeffs[1..1 + k].iter())
            .map(|(&row, &delta)| (ct[row], delta))
            .collect(),
    };
    let trend_estimate = trend_model.evaluate_many(timestamps);
    let yearly_seasonality_estimate = yearly
        .dot(&Array1::from(refit.coeffs[1 + k..].to_vec()))
        .to_vec();

    let fitted = refit.predict(&design);
    let (rmse, r2) = compute_metrics(aggregated.values(), fitted.as_slice().unwrap_or(&[]));
    debug!("trend refit: rmse {rmse:.4}, r2 {r2:.4}");

    let candidates: Vec<NaiveDateTime> = candidates.iter().map(|&i| timestamps[i]).collect();

    Ok(TrendChangepoints {
        changepoints,
        changepoint_indices,
        coefficients,
        candidates,
        original: series.clone(),
        aggregated,
        adaptive_lasso_estimate,
        trend_estimate,
        yearly_seasonality_estimate,
        regularization_strength: fit.lambda,
        trend_model,
    })
}
