//! # trend_changepoint
//!
//! Detects changes in the slope of a time series trend, and in the shape of
//! its seasonal components, with the adaptive lasso.
//!
//! * **Trend**: aggregate, place candidate hinges, penalize them, keep the
//!   survivors and refit a piecewise-linear trend.
//! * **Seasonality**: on the detrended series, find where each Fourier
//!   component changes shape.
//! * **Plot export**: named series ready for an external renderer.
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, NaiveDate};
//! use trend_changepoint::{find_trend_changepoints, plot_series, Frame, PlotComponents, TrendConfig};
//!
//! let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let ts: Vec<_> = (0..600).map(|d| start + Duration::days(d)).collect();
//! let y: Vec<f64> = (0..600)
//!     .map(|d| 20.0 + 0.03 * d as f64 - 0.08 * (d as f64 - 300.0).max(0.0))
//!     .collect();
//! let frame = Frame::new().with_time_column("date", ts).with_numeric_column("sales", y);
//!
//! let config = TrendConfig {
//!     regularization_strength: Some(0.01),
//!     resample_freq: "7D".to_string(),
//!     potential_changepoint_n: 20,
//!     yearly_seasonality_order: 0,
//!     ..Default::default()
//! };
//! let trend = find_trend_changepoints(&frame, "date", "sales", &config).unwrap();
//! println!("changepoints: {:?}", trend.changepoints);
//!
//! let components = PlotComponents {
//!     seasonality_change_by_component: false,
//!     ..Default::default()
//! };
//! let series = plot_series(&trend, None, &components).unwrap();
//! assert_eq!(series.len(), 4);
//! ```

mod candidates;
pub mod data;
mod defaults;
mod features;
pub mod filter;
pub mod freq;
mod lasso;
mod ols;
pub mod plot;
mod projection;
pub mod resample;
pub mod seasonality;
pub mod trend;
mod types;

pub use types::{
    ChangepointError, Estimator, LassoSettings, PostFilter, SeasonalityChangepoints,
    SeasonalityComponent, SeasonalityConfig, TrendChangepoints, TrendConfig, TrendModel,
};

pub use data::{Column, Frame, TimeSeries};
pub use filter::post_filter;
pub use freq::parse_duration;
pub use plot::{plot_series, PlotComponents, PlotKind, PlotRow, PlotSeries};
pub use resample::resample_mean;
pub use seasonality::{detect_seasonality_changepoints, find_seasonality_changepoints};
pub use trend::{detect_trend_changepoints, find_trend_changepoints};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Three years of daily data: trend break at day 600, weekly cycle
    /// doubling at day 700, mild noise.
    fn synthetic(days: i64) -> Frame {
        let mut rng = StdRng::seed_from_u64(42);
        let ts: Vec<_> = (0..days).map(|d| start() + Duration::days(d)).collect();
        let y: Vec<f64> = (0..days)
            .map(|d| {
                let t = d as f64;
                let trend = 100.0 + 0.08 * t - 0.15 * (t - 600.0).max(0.0);
                let amp = if d < 700 { 2.0 } else { 4.0 };
                trend + amp * (2.0 * PI * t / 7.0).sin() + rng.gen_range(-0.3..0.3)
            })
            .collect();
        Frame::new()
            .with_time_column("date", ts)
            .with_numeric_column("value", y)
    }

    fn trend_config() -> TrendConfig {
        TrendConfig {
            regularization_strength: Some(0.01),
            resample_freq: "7D".to_string(),
            potential_changepoint_n: 30,
            yearly_seasonality_order: 2,
            no_changepoint_proportion_from_end: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_trend_then_seasonality() {
        let frame = synthetic(1095);
        let trend = find_trend_changepoints(&frame, "date", "value", &trend_config()).unwrap();
        assert!(!trend.changepoints.is_empty());
        let truth = start() + Duration::days(600);
        assert!(trend
            .changepoints
            .iter()
            .any(|&cp| (cp - truth).num_days().abs() <= 60));

        let season_config = SeasonalityConfig {
            components: vec![SeasonalityComponent::new("weekly", "7D", 2)],
            regularization_strength: Some(0.01),
            potential_changepoint_distance: Some("56D".to_string()),
            actual_changepoint_min_distance: "56D".to_string(),
            ..Default::default()
        };
        let season =
            find_seasonality_changepoints(&frame, "date", "value", &season_config, &trend).unwrap();
        assert!(season.changepoints.contains_key("weekly"));
        assert_eq!(season.seasonality_estimate.len(), season.detrended.len());

        let components = PlotComponents {
            seasonality_estimate: true,
            ..Default::default()
        };
        let series = plot_series(&trend, Some(&season), &components).unwrap();
        assert!(series.iter().any(|s| s.name == "seasonality_change_weekly"));
        assert!(series.iter().any(|s| s.name == "seasonality_estimate"));
    }

    #[test]
    fn test_tail_exclusion() {
        let frame = synthetic(1095);
        let trend = find_trend_changepoints(&frame, "date", "value", &trend_config()).unwrap();
        let cutoff = trend.aggregated.end() - Duration::days(100);
        assert!(trend.candidates.iter().all(|&c| c < cutoff));
        assert!(trend.changepoints.iter().all(|&c| c < cutoff));
    }

    #[test]
    fn test_unsorted_input_matches_sorted() {
        let frame = synthetic(800);
        let sorted = find_trend_changepoints(&frame, "date", "value", &trend_config()).unwrap();

        let series = TimeSeries::from_frame(&frame, "date", "value").unwrap();
        let mut ts = series.timestamps().to_vec();
        let mut vs = series.values().to_vec();
        ts.reverse();
        vs.reverse();
        let reversed = Frame::new()
            .with_time_column("date", ts)
            .with_numeric_column("value", vs);
        let again = find_trend_changepoints(&reversed, "date", "value", &trend_config()).unwrap();
        assert_eq!(sorted.changepoints, again.changepoints);
    }

    #[test]
    fn test_config_round_trip_through_toml() {
        let config: SeasonalityConfig = toml::from_str(
            r#"
            regularization_strength = 0.2
            potential_changepoint_n = 12
            post_filter = "keep_stronger"

            [[components]]
            name = "weekly"
            period = "7D"
            order = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.potential_changepoint_n, 12);
        assert_eq!(config.post_filter, PostFilter::KeepStronger);
        assert_eq!(config.resample_freq, "D");
    }

    #[test]
    fn test_cv_selected_strength() {
        let frame = synthetic(900);
        let config = TrendConfig {
            regularization_strength: None,
            ..trend_config()
        };
        let trend = find_trend_changepoints(&frame, "date", "value", &config).unwrap();
        assert!(trend.regularization_strength.is_finite());
        assert!(trend.regularization_strength > 0.0);
    }
}
