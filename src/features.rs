use std::f64::consts::PI;

use chrono::{Duration, NaiveDateTime};
use ndarray::Array2;

use crate::defaults::DAYS_PER_YEAR;

const MS_PER_YEAR: f64 = DAYS_PER_YEAR * 86_400_000.0;

/// Years elapsed since `origin`.
pub(crate) fn continuous_time(origin: NaiveDateTime, ts: NaiveDateTime) -> f64 {
    (ts - origin).num_milliseconds() as f64 / MS_PER_YEAR
}

pub(crate) fn continuous_times(origin: NaiveDateTime, timestamps: &[NaiveDateTime]) -> Vec<f64> {
    timestamps
        .iter()
        .map(|&ts| continuous_time(origin, ts))
        .collect()
}

/// Fourier basis for a single periodic component.
///
/// Columns are ordered `[sin(2πkφ), cos(2πkφ)]` for `k = 1..=order`, where
/// `φ` is the phase of each timestamp within `period`, measured from `origin`.
pub(crate) fn fourier_terms(
    origin: NaiveDateTime,
    timestamps: &[NaiveDateTime],
    period: Duration,
    order: usize,
) -> Array2<f64> {
    let period_ms = period.num_milliseconds() as f64;
    let mut x = Array2::<f64>::zeros((timestamps.len(), 2 * order));
    for (r, &ts) in timestamps.iter().enumerate() {
        let phase = ((ts - origin).num_milliseconds() as f64 / period_ms).rem_euclid(1.0);
        for k in 1..=order {
            let angle = 2.0 * PI * k as f64 * phase;
            x[[r, 2 * (k - 1)]] = angle.sin();
            x[[r, 2 * (k - 1) + 1]] = angle.cos();
        }
    }
    x
}

/// The yearly period as a duration.
pub(crate) fn year() -> Duration {
    Duration::milliseconds(MS_PER_YEAR as i64)
}

/// Hinge columns `max(0, ct - ct_k)` for each changepoint row index.
pub(crate) fn hinge_columns(ct: &[f64], changepoint_rows: &[usize]) -> Array2<f64> {
    let mut x = Array2::<f64>::zeros((ct.len(), changepoint_rows.len()));
    for (col, &row_k) in changepoint_rows.iter().enumerate() {
        let ct_k = ct[row_k];
        for (r, &t) in ct.iter().enumerate() {
            x[[r, col]] = (t - ct_k).max(0.0);
        }
    }
    x
}

/// Fourier columns switched on from each changepoint row onwards.
///
/// Output columns are grouped by changepoint: block `j` holds `base` masked by
/// `row >= changepoint_rows[j]`.
pub(crate) fn stepped_blocks(base: &Array2<f64>, changepoint_rows: &[usize]) -> Array2<f64> {
    let (n, p) = base.dim();
    let mut x = Array2::<f64>::zeros((n, p * changepoint_rows.len()));
    for (block, &row_k) in changepoint_rows.iter().enumerate() {
        for r in row_k..n {
            for j in 0..p {
                x[[r, block * p + j]] = base[[r, j]];
            }
        }
    }
    x
}

/// Horizontally stack matrices with equal row counts.
pub(crate) fn hstack(blocks: &[&Array2<f64>]) -> Array2<f64> {
    let rows = blocks.first().map_or(0, |b| b.nrows());
    let cols: usize = blocks.iter().map(|b| b.ncols()).sum();
    let mut x = Array2::<f64>::zeros((rows, cols));
    let mut off = 0;
    for b in blocks {
        x.slice_mut(ndarray::s![.., off..off + b.ncols()]).assign(*b);
        off += b.ncols();
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn origin() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_continuous_time_in_years() {
        let ts = origin() + Duration::hours((DAYS_PER_YEAR * 24.0) as i64);
        assert_relative_eq!(continuous_time(origin(), ts), 1.0, epsilon = 1e-9);
        assert_relative_eq!(continuous_time(origin(), origin()), 0.0);
    }

    #[test]
    fn test_fourier_weekly_periodicity() {
        let ts: Vec<_> = (0..15).map(|d| origin() + Duration::days(d)).collect();
        let x = fourier_terms(origin(), &ts, Duration::days(7), 2);
        assert_eq!(x.dim(), (15, 4));
        for j in 0..4 {
            assert_relative_eq!(x[[0, j]], x[[7, j]], epsilon = 1e-12);
            assert_relative_eq!(x[[3, j]], x[[10, j]], epsilon = 1e-12);
        }
        assert_relative_eq!(x[[0, 1]], 1.0);
    }

    #[test]
    fn test_hinge_columns() {
        let ct = vec![0.0, 1.0, 2.0, 3.0];
        let x = hinge_columns(&ct, &[1, 2]);
        assert_eq!(x.column(0).to_vec(), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(x.column(1).to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_stepped_blocks() {
        let base = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let x = stepped_blocks(&base, &[1, 2]);
        assert_eq!(x.dim(), (3, 4));
        assert_eq!(x.row(0).to_vec(), vec![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(x.row(1).to_vec(), vec![3.0, 4.0, 0.0, 0.0]);
        assert_eq!(x.row(2).to_vec(), vec![5.0, 6.0, 5.0, 6.0]);
    }

    #[test]
    fn test_hstack() {
        let a = Array2::from_elem((2, 1), 1.0);
        let b = Array2::from_elem((2, 2), 2.0);
        let x = hstack(&[&a, &b]);
        assert_eq!(x.dim(), (2, 3));
        assert_eq!(x.row(1).to_vec(), vec![1.0, 2.0, 2.0]);
    }
}
