use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::data::TimeSeries;
use crate::defaults::{
    DAYS_PER_YEAR, DEFAULT_FOLDS, DEFAULT_INITIAL_RIDGE_LAMBDA, DEFAULT_LAMBDA_PATH,
    DEFAULT_MIN_DISTANCE, DEFAULT_ONE_SE, DEFAULT_POTENTIAL_N, DEFAULT_RESAMPLE_FREQ,
    DEFAULT_SEASONALITY_POTENTIAL_N, DEFAULT_WEEKLY_ORDER, DEFAULT_YEARLY_COMPONENT_ORDER,
    DEFAULT_YEARLY_ORDER,
};
use crate::features::continuous_time;

/// Which changepoint survives when two fall within the minimum distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFilter {
    /// Scan chronologically and keep the earlier changepoint.
    #[default]
    KeepEarlier,
    /// Keep as many changepoints as the spacing allows, preferring the set
    /// with the larger total absolute coefficient.
    KeepStronger,
}

/// Linear estimator used for preliminary and refit stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    #[default]
    Ridge,
    Ols,
}

/// Adaptive lasso settings shared by trend and seasonality detection.
///
/// Flattened into the owning config, so a flat mapping such as
/// `cv_folds = 5` configures them directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoSettings {
    /// Preliminary estimator whose coefficients become the adaptive weights.
    pub initial_estimator: Estimator,
    /// Ridge strength for the preliminary fit on the standardized problem.
    pub initial_ridge_lambda: f64,
    /// Rolling-origin folds used when the regularization strength is chosen by CV.
    pub cv_folds: usize,
    /// Number of log-spaced penalties tried during CV.
    pub lambda_path_len: usize,
    /// Pick the sparsest penalty within one standard error of the CV optimum.
    pub one_se_rule: bool,
}

impl Default for LassoSettings {
    fn default() -> Self {
        Self {
            initial_estimator: Estimator::Ridge,
            initial_ridge_lambda: DEFAULT_INITIAL_RIDGE_LAMBDA,
            cv_folds: DEFAULT_FOLDS,
            lambda_path_len: DEFAULT_LAMBDA_PATH,
            one_se_rule: DEFAULT_ONE_SE,
        }
    }
}

/// Options for trend changepoint detection.
///
/// Durations and frequencies are strings such as `"D"`, `"7D"`, `"12H"` or
/// `"30min"`.
///
/// # Example
/// ```
/// use trend_changepoint::TrendConfig;
/// let config = TrendConfig {
///     regularization_strength: Some(0.05),
///     resample_freq: "7D".to_string(),
///     potential_changepoint_n: 25,
///     no_changepoint_proportion_from_end: 0.2,
///     ..Default::default()
/// };
/// assert_eq!(config.yearly_seasonality_order, 8);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Fourier order of the yearly term fitted jointly with the trend; 0 disables it.
    pub yearly_seasonality_order: usize,
    /// Penalty on the standardized problem; `None` selects it by time-series CV.
    pub regularization_strength: Option<f64>,
    /// Aggregation bucket size.
    pub resample_freq: String,
    /// Number of evenly spaced candidates.
    pub potential_changepoint_n: usize,
    /// Candidate spacing; overrides `potential_changepoint_n` when set.
    pub potential_changepoint_distance: Option<String>,
    pub no_changepoint_proportion_from_begin: f64,
    pub no_changepoint_distance_from_begin: Option<String>,
    /// Fraction of the time span at the tail where no candidate is placed.
    pub no_changepoint_proportion_from_end: f64,
    pub no_changepoint_distance_from_end: Option<String>,
    /// Minimum spacing between detected changepoints.
    pub actual_changepoint_min_distance: String,
    pub post_filter: PostFilter,
    /// Estimator used to refit the trend on the detected changepoints.
    pub trend_estimator: Estimator,
    #[serde(flatten)]
    pub lasso: LassoSettings,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            yearly_seasonality_order: DEFAULT_YEARLY_ORDER,
            regularization_strength: None,
            resample_freq: DEFAULT_RESAMPLE_FREQ.to_string(),
            potential_changepoint_n: DEFAULT_POTENTIAL_N,
            potential_changepoint_distance: None,
            no_changepoint_proportion_from_begin: 0.0,
            no_changepoint_distance_from_begin: None,
            no_changepoint_proportion_from_end: 0.0,
            no_changepoint_distance_from_end: None,
            actual_changepoint_min_distance: DEFAULT_MIN_DISTANCE.to_string(),
            post_filter: PostFilter::default(),
            trend_estimator: Estimator::default(),
            lasso: LassoSettings::default(),
        }
    }
}

/// A periodic component whose shape may change over time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityComponent {
    pub name: String,
    /// Period as a duration string, e.g. `"7D"`.
    pub period: String,
    /// Fourier order.
    pub order: usize,
}

impl SeasonalityComponent {
    pub fn new(name: impl Into<String>, period: impl Into<String>, order: usize) -> Self {
        Self {
            name: name.into(),
            period: period.into(),
            order,
        }
    }
}

/// Options for seasonality changepoint detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    pub components: Vec<SeasonalityComponent>,
    pub regularization_strength: Option<f64>,
    pub resample_freq: String,
    pub potential_changepoint_n: usize,
    /// Minimum spacing between seasonality candidates; overrides the count when set.
    pub potential_changepoint_distance: Option<String>,
    pub no_changepoint_proportion_from_end: f64,
    pub no_changepoint_distance_from_end: Option<String>,
    pub actual_changepoint_min_distance: String,
    pub post_filter: PostFilter,
    #[serde(flatten)]
    pub lasso: LassoSettings,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            components: vec![
                SeasonalityComponent::new("weekly", "7D", DEFAULT_WEEKLY_ORDER),
                SeasonalityComponent::new("yearly", "8766H", DEFAULT_YEARLY_COMPONENT_ORDER),
            ],
            regularization_strength: None,
            resample_freq: DEFAULT_RESAMPLE_FREQ.to_string(),
            potential_changepoint_n: DEFAULT_SEASONALITY_POTENTIAL_N,
            potential_changepoint_distance: None,
            no_changepoint_proportion_from_end: 0.0,
            no_changepoint_distance_from_end: None,
            actual_changepoint_min_distance: DEFAULT_MIN_DISTANCE.to_string(),
            post_filter: PostFilter::default(),
            lasso: LassoSettings::default(),
        }
    }
}

/// Piecewise-linear trend refit on the detected changepoints.
///
/// `ct` is continuous time in years since `origin`; each changepoint adds
/// `delta * max(0, ct - ct_k)` to the slope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrendModel {
    pub origin: NaiveDateTime,
    pub intercept: f64,
    pub growth: f64,
    /// `(ct_k, delta_k)` pairs in chronological order.
    pub changepoints: Vec<(f64, f64)>,
}

impl TrendModel {
    pub fn evaluate(&self, ts: NaiveDateTime) -> f64 {
        let ct = continuous_time(self.origin, ts);
        let hinge: f64 = self
            .changepoints
            .iter()
            .map(|&(ct_k, delta)| delta * (ct - ct_k).max(0.0))
            .sum();
        self.intercept + self.growth * ct + hinge
    }

    pub fn evaluate_many(&self, timestamps: &[NaiveDateTime]) -> Vec<f64> {
        timestamps.iter().map(|&ts| self.evaluate(ts)).collect()
    }

    /// Slope in value units per day at `ts`.
    pub fn slope_per_day(&self, ts: NaiveDateTime) -> f64 {
        let ct = continuous_time(self.origin, ts);
        let per_year = self.growth
            + self
                .changepoints
                .iter()
                .filter(|&&(ct_k, _)| ct >= ct_k)
                .map(|&(_, delta)| delta)
                .sum::<f64>();
        per_year / DAYS_PER_YEAR
    }
}

/// Output of trend changepoint detection.
///
/// All estimate vectors are aligned with `aggregated.timestamps()`.
#[derive(Clone, Debug, Serialize)]
pub struct TrendChangepoints {
    /// Detected changepoints in chronological order.
    pub changepoints: Vec<NaiveDateTime>,
    /// Positions of `changepoints` in the aggregated series.
    pub changepoint_indices: Vec<usize>,
    /// Slope change (value units per year) at each detected changepoint.
    pub coefficients: Vec<f64>,
    /// Every candidate location considered.
    pub candidates: Vec<NaiveDateTime>,
    pub original: TimeSeries,
    pub aggregated: TimeSeries,
    /// Trend part of the adaptive lasso fit.
    pub adaptive_lasso_estimate: Vec<f64>,
    /// Trend refit on the detected changepoints.
    pub trend_estimate: Vec<f64>,
    pub yearly_seasonality_estimate: Vec<f64>,
    /// Penalty actually used (given or selected by CV).
    pub regularization_strength: f64,
    pub trend_model: TrendModel,
}

/// Output of seasonality changepoint detection.
#[derive(Clone, Debug, Serialize)]
pub struct SeasonalityChangepoints {
    /// Detected changepoints per component name.
    pub changepoints: BTreeMap<String, Vec<NaiveDateTime>>,
    /// L2 norm of each detected changepoint's coefficient block.
    pub strengths: BTreeMap<String, Vec<f64>>,
    pub candidates: Vec<NaiveDateTime>,
    /// Aggregated series minus the trend.
    pub detrended: TimeSeries,
    /// Fitted seasonal curve per component, aligned with `detrended`.
    pub component_estimates: BTreeMap<String, Vec<f64>>,
    pub seasonality_estimate: Vec<f64>,
    pub regularization_strength: f64,
}

/// Library error type.
#[derive(thiserror::Error, Debug)]
pub enum ChangepointError {
    #[error("column `{0}` not found")]
    MissingColumn(String),
    #[error("column `{name}` is not a {expected} column")]
    ColumnKind {
        name: String,
        expected: &'static str,
    },
    #[error("empty input")]
    EmptyInput,
    #[error("input lengths mismatch")]
    LengthMismatch,
    #[error("duplicate timestamp {0}")]
    DuplicateTimestamp(NaiveDateTime),
    #[error("malformed frequency `{0}`")]
    MalformedFrequency(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("insufficient data: need at least {needed} eligible points, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("linear algebra failure: {0}")]
    Linalg(String),
}
