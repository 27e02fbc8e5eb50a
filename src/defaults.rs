//! Default constants for changepoint detection and fitting.

pub const DEFAULT_YEARLY_ORDER: usize = 8;
pub const DEFAULT_RESAMPLE_FREQ: &str = "D";
pub const DEFAULT_POTENTIAL_N: usize = 100;
pub const DEFAULT_SEASONALITY_POTENTIAL_N: usize = 50;
pub const DEFAULT_MIN_DISTANCE: &str = "30D";
pub const DEFAULT_INITIAL_RIDGE_LAMBDA: f64 = 0.1;
pub const DEFAULT_TREND_RIDGE_LAMBDA: f64 = 1e-3;
pub const DEFAULT_FOLDS: usize = 4;
pub const DEFAULT_ONE_SE: bool = true;
pub const DEFAULT_LAMBDA_PATH: usize = 20;
pub const DEFAULT_CD_TOL: f64 = 1e-6;
pub const DEFAULT_CD_MAX_ITER: u32 = 10_000;

pub const DEFAULT_WEEKLY_ORDER: usize = 3;
pub const DEFAULT_YEARLY_COMPONENT_ORDER: usize = 15;

/// Coefficients at or below this magnitude are treated as exactly zero.
pub const ZERO_COEF_EPS: f64 = 1e-8;

/// Days per year used for continuous time and the yearly period.
pub const DAYS_PER_YEAR: f64 = 365.25;
