//! Mean aggregation into fixed-width time buckets.

use chrono::{Duration, NaiveDateTime};
use log::debug;

use crate::data::TimeSeries;
use crate::types::ChangepointError;

/// Average values within buckets of width `freq`.
///
/// Buckets are anchored at midnight of the first timestamp's day and labelled
/// by their start. Empty buckets are skipped, so the output stays strictly
/// increasing.
pub fn resample_mean(series: &TimeSeries, freq: Duration) -> Result<TimeSeries, ChangepointError> {
    let width = freq.num_milliseconds();
    if width <= 0 {
        return Err(ChangepointError::InvalidConfig(
            "resample frequency must be positive".to_string(),
        ));
    }

    let anchor = series
        .start()
        .date()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ChangepointError::InvalidConfig("invalid bucket anchor".to_string()))?;

    let mut timestamps: Vec<NaiveDateTime> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut current: Option<i64> = None;
    let mut sum = 0.0;
    let mut count = 0usize;

    for (&t, &v) in series.timestamps().iter().zip(series.values()) {
        let bucket = (t - anchor).num_milliseconds().div_euclid(width);
        if current != Some(bucket) {
            if let Some(prev) = current {
                timestamps.push(anchor + Duration::milliseconds(prev * width));
                values.push(sum / count as f64);
            }
            current = Some(bucket);
            sum = 0.0;
            count = 0;
        }
        sum += v;
        count += 1;
    }
    if let Some(prev) = current {
        timestamps.push(anchor + Duration::milliseconds(prev * width));
        values.push(sum / count as f64);
    }

    debug!(
        "aggregated {} observations into {} buckets",
        series.len(),
        timestamps.len()
    );
    TimeSeries::new(timestamps, values)
}
