//! Seasonality changepoint detection.
//!
//! Works on the series with a detected trend removed. Each component gets
//! a base Fourier block plus, for every candidate, a copy of that block that
//! only switches on from the candidate onwards. A non-zero copy means the
//! component's shape changed there.

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDateTime};
use log::{debug, warn};
use ndarray::{s, Array1, Array2};

use crate::candidates::{place_candidates, CandidatePlan};
use crate::data::{Frame, TimeSeries};
use crate::defaults::ZERO_COEF_EPS;
use crate::features::{fourier_terms, hstack, stepped_blocks};
use crate::filter::post_filter;
use crate::freq::parse_duration;
use crate::lasso::adaptive_lasso;
use crate::resample::resample_mean;
use crate::types::{
    ChangepointError, SeasonalityChangepoints, SeasonalityConfig, TrendChangepoints,
};

struct ParsedComponent {
    name: String,
    period: Duration,
    order: usize,
}

fn parse_components(config: &SeasonalityConfig) -> Result<Vec<ParsedComponent>, ChangepointError> {
    if config.components.is_empty() {
        return Err(ChangepointError::InvalidConfig(
            "at least one seasonality component is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    config
        .components
        .iter()
        .map(|c| {
            if !seen.insert(c.name.as_str()) {
                return Err(ChangepointError::InvalidConfig(format!(
                    "duplicate seasonality component `{}`",
                    c.name
                )));
            }
            if c.order == 0 {
                return Err(ChangepointError::InvalidConfig(format!(
                    "seasonality component `{}` needs a positive order",
                    c.name
                )));
            }
            Ok(ParsedComponent {
                name: c.name.clone(),
                period: parse_duration(&c.period)?,
                order: c.order,
            })
        })
        .collect()
}

/// Detect changes in the shape of each seasonal component.
///
/// `trend` is the result of trend detection on the same series; its refit
/// trend is subtracted before fitting.
///
/// # Errors
/// As for trend detection, plus empty or duplicate component lists and
/// components with order 0.
pub fn find_seasonality_changepoints(
    frame: &Frame,
    time_col: &str,
    value_col: &str,
    config: &SeasonalityConfig,
    trend: &TrendChangepoints,
) -> Result<SeasonalityChangepoints, ChangepointError> {
    let series = TimeSeries::from_frame(frame, time_col, value_col)?;
    detect_seasonality_changepoints(&series, config, trend)
}

/// Same as [`find_seasonality_changepoints`] for an already extracted series.
pub fn detect_seasonality_changepoints(
    series: &TimeSeries,
    config: &SeasonalityConfig,
    trend: &TrendChangepoints,
) -> Result<SeasonalityChangepoints, ChangepointError> {
    let freq = parse_duration(&config.resample_freq)?;
    let min_distance = parse_duration(&config.actual_changepoint_min_distance)?;
    let plan = CandidatePlan::from_seasonality(config)?;
    let components = parse_components(config)?;

    let aggregated = resample_mean(series, freq)?;
    let timestamps = aggregated.timestamps();
    let trend_values = trend.trend_model.evaluate_many(timestamps);
    let detrended_values: Vec<f64> = aggregated
        .values()
        .iter()
        .zip(trend_values.iter())
        .map(|(v, t)| v - t)
        .collect();
    let y = Array1::from(detrended_values.clone());
    let origin = aggregated.start();

    let candidates = place_candidates(timestamps, &plan)?;

    let bases: Vec<Array2<f64>> = components
        .iter()
        .map(|c| fourier_terms(origin, timestamps, c.period, c.order))
        .collect();
    let stepped: Vec<Array2<f64>> = bases
        .iter()
        .map(|b| stepped_blocks(b, &candidates))
        .collect();
    let unpenalized = hstack(&bases.iter().collect::<Vec<_>>());
    let penalized = hstack(&stepped.iter().collect::<Vec<_>>());

    let fit = adaptive_lasso(
        &unpenalized,
        &penalized,
        &y,
        &config.lasso,
        config.regularization_strength,
    )?;

    let mut changepoints = BTreeMap::new();
    let mut strengths = BTreeMap::new();
    let mut component_estimates = BTreeMap::new();
    let mut seasonality_estimate = vec![0.0; timestamps.len()];

    // gamma[0] is the intercept
    let mut base_off = 1;
    let mut step_off = 0;
    for ((component, base), step) in components.iter().zip(&bases).zip(&stepped) {
        let width = 2 * component.order;
        let gamma_c = Array1::from(fit.gamma[base_off..base_off + width].to_vec());
        let beta_c = Array1::from(fit.beta[step_off..step_off + step.ncols()].to_vec());

        let mut detected_ts: Vec<NaiveDateTime> = Vec::new();
        let mut detected_norm: Vec<f64> = Vec::new();
        for (j, &row) in candidates.iter().enumerate() {
            let block = beta_c.slice(s![j * width..(j + 1) * width]);
            let norm = block.dot(&block).sqrt();
            if norm > ZERO_COEF_EPS {
                detected_ts.push(timestamps[row]);
                detected_norm.push(norm);
            }
        }
        let kept = post_filter(&detected_ts, &detected_norm, min_distance, config.post_filter)?;
        debug!(
            "component `{}`: {} non-zero candidates, {} after post-filter",
            component.name,
            detected_ts.len(),
            kept.len()
        );

        let estimate = base.dot(&gamma_c) + step.dot(&beta_c);
        for (acc, v) in seasonality_estimate.iter_mut().zip(estimate.iter()) {
            *acc += v;
        }

        changepoints.insert(
            component.name.clone(),
            kept.iter().map(|&i| detected_ts[i]).collect::<Vec<_>>(),
        );
        strengths.insert(
            component.name.clone(),
            kept.iter().map(|&i| detected_norm[i]).collect::<Vec<_>>(),
        );
        component_estimates.insert(component.name.clone(), estimate.to_vec());

        base_off += width;
        step_off += step.ncols();
    }

    if changepoints.values().all(|v: &Vec<NaiveDateTime>| v.is_empty()) {
        warn!(
            "no seasonality changepoints detected (regularization strength {:.6})",
            fit.lambda
        );
    }

    let candidate_ts: Vec<NaiveDateTime> = candidates.iter().map(|&i| timestamps[i]).collect();
    let detrended = TimeSeries::new(timestamps.to_vec(), detrended_values)?;

    Ok(SeasonalityChangepoints {
        changepoints,
        strengths,
        candidates: candidate_ts,
        detrended,
        component_estimates,
        seasonality_estimate,
        regularization_strength: fit.lambda,
    })
}
