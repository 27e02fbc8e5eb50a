//! Named series for plotting detection results.
//!
//! Rendering is left to the caller; this module only decides which curves
//! and markers exist and what their coordinates are.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{ChangepointError, SeasonalityChangepoints, TrendChangepoints};

/// Which series [`plot_series`] emits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotComponents {
    /// Aggregated observations.
    pub observation: bool,
    /// Observations before aggregation.
    pub observation_original: bool,
    pub trend_estimate: bool,
    /// Markers on the trend at each trend changepoint.
    pub trend_change: bool,
    pub yearly_seasonality_estimate: bool,
    pub adaptive_lasso_estimate: bool,
    /// Markers for seasonality changepoints of all components together.
    pub seasonality_change: bool,
    /// One marker series per seasonal component.
    pub seasonality_change_by_component: bool,
    /// Trend plus the fitted seasonality.
    pub seasonality_estimate: bool,
}

impl Default for PlotComponents {
    fn default() -> Self {
        Self {
            observation: true,
            observation_original: true,
            trend_estimate: true,
            trend_change: true,
            yearly_seasonality_estimate: false,
            adaptive_lasso_estimate: false,
            seasonality_change: false,
            seasonality_change_by_component: true,
            seasonality_estimate: false,
        }
    }
}

impl PlotComponents {
    fn needs_seasonality(&self) -> bool {
        self.seasonality_change || self.seasonality_change_by_component || self.seasonality_estimate
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    Line,
    Markers,
}

/// One named curve or marker set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlotSeries {
    pub name: String,
    pub kind: PlotKind,
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

/// A single point of a [`PlotSeries`], in long format.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlotRow<'a> {
    pub series: &'a str,
    pub kind: PlotKind,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl PlotSeries {
    fn new(
        name: impl Into<String>,
        kind: PlotKind,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            timestamps,
            values,
        }
    }

    /// Points in long format, ready for a CSV writer.
    pub fn rows(&self) -> impl Iterator<Item = PlotRow<'_>> {
        self.timestamps
            .iter()
            .zip(self.values.iter())
            .map(move |(&timestamp, &value)| PlotRow {
                series: &self.name,
                kind: self.kind,
                timestamp,
                value,
            })
    }
}

/// Build the enabled plot series from detection results.
///
/// # Errors
/// `InvalidConfig` when a seasonality series is requested but `seasonality`
/// is `None`.
pub fn plot_series(
    trend: &TrendChangepoints,
    seasonality: Option<&SeasonalityChangepoints>,
    components: &PlotComponents,
) -> Result<Vec<PlotSeries>, ChangepointError> {
    let season = match (seasonality, components.needs_seasonality()) {
        (None, true) => {
            return Err(ChangepointError::InvalidConfig(
                "seasonality series requested without a seasonality result".to_string(),
            ))
        }
        (s, _) => s,
    };

    let agg_ts = trend.aggregated.timestamps();
    let mut out = Vec::new();

    if components.observation_original {
        out.push(PlotSeries::new(
            "observation_original",
            PlotKind::Line,
            trend.original.timestamps().to_vec(),
            trend.original.values().to_vec(),
        ));
    }
    if components.observation {
        out.push(PlotSeries::new(
            "observation",
            PlotKind::Line,
            agg_ts.to_vec(),
            trend.aggregated.values().to_vec(),
        ));
    }
    if components.trend_estimate {
        out.push(PlotSeries::new(
            "trend_estimate",
            PlotKind::Line,
            agg_ts.to_vec(),
            trend.trend_estimate.clone(),
        ));
    }
    if components.trend_change {
        out.push(PlotSeries::new(
            "trend_change",
            PlotKind::Markers,
            trend.changepoints.clone(),
            trend
                .changepoint_indices
                .iter()
                .map(|&i| trend.trend_estimate[i])
                .collect(),
        ));
    }
    if components.yearly_seasonality_estimate {
        out.push(PlotSeries::new(
            "yearly_seasonality_estimate",
            PlotKind::Line,
            agg_ts.to_vec(),
            trend.yearly_seasonality_estimate.clone(),
        ));
    }
    if components.adaptive_lasso_estimate {
        out.push(PlotSeries::new(
            "adaptive_lasso_estimate",
            PlotKind::Line,
            agg_ts.to_vec(),
            trend.adaptive_lasso_estimate.clone(),
        ));
    }

    if let Some(season) = season {
        let season_ts = season.detrended.timestamps();
        // trend + seasonality on the seasonality grid
        let fitted: Vec<f64> = trend
            .trend_model
            .evaluate_many(season_ts)
            .iter()
            .zip(season.seasonality_estimate.iter())
            .map(|(t, s)| t + s)
            .collect();
        let markers = |points: &[NaiveDateTime]| -> Vec<f64> {
            points
                .iter()
                .map(|ts| match season_ts.binary_search(ts) {
                    Ok(i) => fitted[i],
                    Err(_) => trend.trend_model.evaluate(*ts),
                })
                .collect()
        };

        if components.seasonality_change {
            let mut all: Vec<NaiveDateTime> =
                season.changepoints.values().flatten().copied().collect();
            all.sort_unstable();
            all.dedup();
            let values = markers(&all);
            out.push(PlotSeries::new(
                "seasonality_change",
                PlotKind::Markers,
                all,
                values,
            ));
        }
        if components.seasonality_change_by_component {
            for (name, points) in &season.changepoints {
                out.push(PlotSeries::new(
                    format!("seasonality_change_{name}"),
                    PlotKind::Markers,
                    points.clone(),
                    markers(points),
                ));
            }
        }
        if components.seasonality_estimate {
            out.push(PlotSeries::new(
                "seasonality_estimate",
                PlotKind::Line,
                season_ts.to_vec(),
                fitted,
            ));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::{Duration, NaiveDate};

    use crate::data::TimeSeries;
    use crate::types::TrendModel;

    fn day(d: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(d)
    }

    fn trend_result() -> TrendChangepoints {
        let ts: Vec<_> = (0..10).map(day).collect();
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let series = TimeSeries::new(ts.clone(), values.clone()).unwrap();
        TrendChangepoints {
            changepoints: vec![day(4)],
            changepoint_indices: vec![4],
            coefficients: vec![1.0],
            candidates: vec![day(2), day(4), day(6)],
            original: series.clone(),
            aggregated: series,
            adaptive_lasso_estimate: values.clone(),
            trend_estimate: values.iter().map(|v| v + 0.5).collect(),
            yearly_seasonality_estimate: vec![0.0; 10],
            regularization_strength: 0.1,
            trend_model: TrendModel {
                origin: day(0),
                intercept: 0.5,
                growth: 365.25,
                changepoints: vec![],
            },
        }
    }

    fn seasonality_result() -> SeasonalityChangepoints {
        let ts: Vec<_> = (0..10).map(day).collect();
        let mut changepoints = BTreeMap::new();
        changepoints.insert("weekly".to_string(), vec![day(3)]);
        changepoints.insert("yearly".to_string(), vec![day(3), day(7)]);
        SeasonalityChangepoints {
            changepoints,
            strengths: BTreeMap::new(),
            candidates: vec![day(3), day(7)],
            detrended: TimeSeries::new(ts, vec![0.0; 10]).unwrap(),
            component_estimates: BTreeMap::new(),
            seasonality_estimate: vec![1.0; 10],
            regularization_strength: 0.1,
        }
    }

    fn names(series: &[PlotSeries]) -> Vec<&str> {
        series.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_defaults_without_seasonality_flags() {
        let components = PlotComponents {
            seasonality_change_by_component: false,
            ..Default::default()
        };
        let out = plot_series(&trend_result(), None, &components).unwrap();
        assert_eq!(
            names(&out),
            vec!["observation_original", "observation", "trend_estimate", "trend_change"]
        );
        let change = &out[3];
        assert_eq!(change.kind, PlotKind::Markers);
        assert_eq!(change.timestamps, vec![day(4)]);
        assert_eq!(change.values, vec![4.5]);
    }

    #[test]
    fn test_seasonality_requires_result() {
        let err = plot_series(&trend_result(), None, &PlotComponents::default()).unwrap_err();
        assert!(matches!(err, ChangepointError::InvalidConfig(_)));
    }

    #[test]
    fn test_seasonality_series() {
        let components = PlotComponents {
            observation: false,
            observation_original: false,
            trend_estimate: false,
            trend_change: false,
            seasonality_change: true,
            seasonality_change_by_component: true,
            seasonality_estimate: true,
            ..Default::default()
        };
        let season = seasonality_result();
        let out = plot_series(&trend_result(), Some(&season), &components).unwrap();
        assert_eq!(
            names(&out),
            vec![
                "seasonality_change",
                "seasonality_change_weekly",
                "seasonality_change_yearly",
                "seasonality_estimate"
            ]
        );
        // union of component changepoints, deduplicated
        assert_eq!(out[0].timestamps, vec![day(3), day(7)]);
        // trend at day 3 is 3.5, plus seasonality 1.0
        assert!((out[1].values[0] - 4.5).abs() < 1e-9);
        assert_eq!(out[3].values.len(), 10);
    }

    #[test]
    fn test_rows_long_format() {
        let out = plot_series(
            &trend_result(),
            None,
            &PlotComponents {
                observation_original: false,
                trend_estimate: false,
                trend_change: false,
                seasonality_change_by_component: false,
                ..Default::default()
            },
        )
        .unwrap();
        let rows: Vec<_> = out[0].rows().collect();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[2].series, "observation");
        assert_eq!(rows[2].timestamp, day(2));
        assert_eq!(rows[2].value, 2.0);
    }
}
