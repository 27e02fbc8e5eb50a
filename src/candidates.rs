//! Placement of potential changepoints over an aggregated series.

use chrono::{Duration, NaiveDateTime};
use log::debug;

use crate::freq::parse_optional;
use crate::types::{ChangepointError, SeasonalityConfig, TrendConfig};

/// Where candidates may go and how many.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CandidatePlan {
    pub count: usize,
    pub distance: Option<Duration>,
    pub proportion_from_begin: f64,
    pub distance_from_begin: Option<Duration>,
    pub proportion_from_end: f64,
    pub distance_from_end: Option<Duration>,
}

fn check_proportion(name: &str, value: f64) -> Result<f64, ChangepointError> {
    if (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ChangepointError::InvalidConfig(format!(
            "{name} must be in [0, 1), got {value}"
        )))
    }
}

impl CandidatePlan {
    pub fn from_trend(config: &TrendConfig) -> Result<Self, ChangepointError> {
        Self {
            count: config.potential_changepoint_n,
            distance: parse_optional(config.potential_changepoint_distance.as_deref())?,
            proportion_from_begin: check_proportion(
                "no_changepoint_proportion_from_begin",
                config.no_changepoint_proportion_from_begin,
            )?,
            distance_from_begin: parse_optional(
                config.no_changepoint_distance_from_begin.as_deref(),
            )?,
            proportion_from_end: check_proportion(
                "no_changepoint_proportion_from_end",
                config.no_changepoint_proportion_from_end,
            )?,
            distance_from_end: parse_optional(config.no_changepoint_distance_from_end.as_deref())?,
        }
        .checked()
    }

    pub fn from_seasonality(config: &SeasonalityConfig) -> Result<Self, ChangepointError> {
        Self {
            count: config.potential_changepoint_n,
            distance: parse_optional(config.potential_changepoint_distance.as_deref())?,
            proportion_from_begin: 0.0,
            distance_from_begin: None,
            proportion_from_end: check_proportion(
                "no_changepoint_proportion_from_end",
                config.no_changepoint_proportion_from_end,
            )?,
            distance_from_end: parse_optional(config.no_changepoint_distance_from_end.as_deref())?,
        }
        .checked()
    }

    fn checked(self) -> Result<Self, ChangepointError> {
        if self.distance.is_none() && self.count == 0 {
            return Err(ChangepointError::InvalidConfig(
                "potential_changepoint_n must be positive".to_string(),
            ));
        }
        Ok(self)
    }

    /// Latest timestamp (exclusive) at which a candidate may sit.
    pub fn end_cutoff(&self, start: NaiveDateTime, end: NaiveDateTime) -> NaiveDateTime {
        let by_proportion = scale_duration(end - start, self.proportion_from_end);
        let excluded = self
            .distance_from_end
            .map_or(by_proportion, |d| d.max(by_proportion));
        end - excluded
    }

    /// Earliest timestamp (inclusive) at which a candidate may sit.
    pub fn begin_cutoff(&self, start: NaiveDateTime, end: NaiveDateTime) -> NaiveDateTime {
        let by_proportion = scale_duration(end - start, self.proportion_from_begin);
        let excluded = self
            .distance_from_begin
            .map_or(by_proportion, |d| d.max(by_proportion));
        start + excluded
    }
}

fn scale_duration(span: Duration, factor: f64) -> Duration {
    Duration::milliseconds((span.num_milliseconds() as f64 * factor).round() as i64)
}

/// Indices into `timestamps` eligible to become changepoints, in order.
///
/// The first point never qualifies (its hinge coincides with the growth
/// term), and neither does anything inside the begin/end exclusion zones.
///
/// # Errors
/// `InsufficientData` when fewer eligible positions exist than requested
/// candidates, or none at all in distance mode.
pub(crate) fn place_candidates(
    timestamps: &[NaiveDateTime],
    plan: &CandidatePlan,
) -> Result<Vec<usize>, ChangepointError> {
    if timestamps.len() < 2 {
        return Err(ChangepointError::InsufficientData {
            needed: plan.count.max(1),
            got: 0,
        });
    }
    let start = timestamps[0];
    let end = timestamps[timestamps.len() - 1];
    let begin_cutoff = plan.begin_cutoff(start, end);
    let end_cutoff = plan.end_cutoff(start, end);

    let eligible: Vec<usize> = (1..timestamps.len())
        .filter(|&i| timestamps[i] >= begin_cutoff && timestamps[i] < end_cutoff)
        .collect();

    let chosen = match plan.distance {
        Some(distance) => {
            let mut chosen: Vec<usize> = Vec::new();
            for &i in eligible.iter() {
                match chosen.last() {
                    Some(&last) if timestamps[i] - timestamps[last] < distance => {}
                    _ => chosen.push(i),
                }
            }
            if chosen.is_empty() {
                return Err(ChangepointError::InsufficientData { needed: 1, got: 0 });
            }
            chosen
        }
        None => {
            let m = eligible.len();
            let n = plan.count;
            if m < n {
                return Err(ChangepointError::InsufficientData { needed: n, got: m });
            }
            // centred even spacing; distinct because m >= n
            (0..n).map(|i| eligible[((2 * i + 1) * m) / (2 * n)]).collect()
        }
    };

    debug!(
        "placed {} candidates among {} eligible points (cutoffs {} .. {})",
        chosen.len(),
        eligible.len(),
        begin_cutoff,
        end_cutoff
    );
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn daily(n: i64) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2010, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::days(i)).collect()
    }

    fn plan(count: usize) -> CandidatePlan {
        CandidatePlan {
            count,
            distance: None,
            proportion_from_begin: 0.0,
            distance_from_begin: None,
            proportion_from_end: 0.0,
            distance_from_end: None,
        }
    }

    #[test]
    fn test_even_placement_is_strictly_increasing() {
        let ts = daily(101);
        let idx = place_candidates(&ts, &plan(10)).unwrap();
        assert_eq!(idx.len(), 10);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
        assert!(idx[0] >= 1);
        assert!(*idx.last().unwrap() < 100);
    }

    #[test]
    fn test_tail_exclusion() {
        let ts = daily(1001);
        let p = CandidatePlan {
            proportion_from_end: 0.2,
            ..plan(50)
        };
        let idx = place_candidates(&ts, &p).unwrap();
        assert!(idx.iter().all(|&i| i < 800));
    }

    #[test]
    fn test_distance_exclusions_take_the_larger_zone() {
        let ts = daily(101);
        let p = CandidatePlan {
            proportion_from_end: 0.1,
            distance_from_end: Some(Duration::days(30)),
            distance_from_begin: Some(Duration::days(5)),
            ..plan(5)
        };
        let idx = place_candidates(&ts, &p).unwrap();
        assert!(idx.iter().all(|&i| (5..70).contains(&i)));
    }

    #[test]
    fn test_distance_mode_spacing() {
        let ts = daily(100);
        let p = CandidatePlan {
            distance: Some(Duration::days(7)),
            ..plan(0)
        };
        let idx = place_candidates(&ts, &p).unwrap();
        assert_eq!(idx[0], 1);
        assert!(idx.windows(2).all(|w| w[1] - w[0] == 7));
        assert!(*idx.last().unwrap() < 99);
    }

    #[test]
    fn test_insufficient_eligible_points() {
        let ts = daily(8);
        let err = place_candidates(&ts, &plan(10)).unwrap_err();
        assert!(matches!(
            err,
            ChangepointError::InsufficientData { needed: 10, got: 6 }
        ));
    }

    #[test]
    fn test_invalid_proportion_rejected() {
        let config = TrendConfig {
            no_changepoint_proportion_from_end: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            CandidatePlan::from_trend(&config),
            Err(ChangepointError::InvalidConfig(_))
        ));
        let config = TrendConfig {
            no_changepoint_proportion_from_end: -0.1,
            ..Default::default()
        };
        assert!(CandidatePlan::from_trend(&config).is_err());
    }

    #[test]
    fn test_zero_count_rejected() {
        let config = TrendConfig {
            potential_changepoint_n: 0,
            ..Default::default()
        };
        assert!(CandidatePlan::from_trend(&config).is_err());
    }
}
