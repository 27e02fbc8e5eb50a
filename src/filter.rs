//! Minimum-distance post-filter for detected changepoints.

use chrono::{Duration, NaiveDateTime};

use crate::types::{ChangepointError, PostFilter};

/// Thin out changepoints closer together than `min_distance`.
///
/// `timestamps` must be chronological and `strengths` aligned with it.
/// Returns the positions (into the inputs) that survive, in chronological
/// order. Two survivors are always at least `min_distance` apart.
///
/// Both policies keep as many changepoints as the spacing allows, so
/// removing an input never increases the number of survivors.
/// `KeepEarlier` takes the chronologically first such set; `KeepStronger`
/// the one with the largest total `|strength|`.
///
/// # Errors
/// `LengthMismatch` when `strengths` is not aligned with `timestamps`.
///
/// # Example
/// ```
/// use chrono::{Duration, NaiveDate};
/// use trend_changepoint::{post_filter, PostFilter};
///
/// let day = |d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let ts = [day(1), day(5), day(20)];
/// let kept = post_filter(&ts, &[0.1, 2.0, 1.0], Duration::days(10), PostFilter::KeepEarlier).unwrap();
/// assert_eq!(kept, vec![0, 2]);
/// let kept = post_filter(&ts, &[0.1, 2.0, 1.0], Duration::days(10), PostFilter::KeepStronger).unwrap();
/// assert_eq!(kept, vec![1, 2]);
/// ```
pub fn post_filter(
    timestamps: &[NaiveDateTime],
    strengths: &[f64],
    min_distance: Duration,
    policy: PostFilter,
) -> Result<Vec<usize>, ChangepointError> {
    if timestamps.len() != strengths.len() {
        return Err(ChangepointError::LengthMismatch);
    }
    let kept = match policy {
        PostFilter::KeepEarlier => {
            let mut kept: Vec<usize> = Vec::new();
            for i in 0..timestamps.len() {
                match kept.last() {
                    Some(&last) if timestamps[i] - timestamps[last] < min_distance => {}
                    _ => kept.push(i),
                }
            }
            kept
        }
        PostFilter::KeepStronger => keep_stronger(timestamps, strengths, min_distance),
    };
    Ok(kept)
}

/// Best spaced subset of a prefix: (count, total |strength|, last taken).
#[derive(Clone, Copy)]
struct Best {
    count: usize,
    total: f64,
    taken: Option<usize>,
}

impl Best {
    fn beats(&self, other: &Best) -> bool {
        self.count > other.count || (self.count == other.count && self.total > other.total)
    }
}

/// Weighted interval scheduling over the chronological points: maximise the
/// count first, then the total strength. Ties keep the earlier points.
fn keep_stronger(
    timestamps: &[NaiveDateTime],
    strengths: &[f64],
    min_distance: Duration,
) -> Vec<usize> {
    let n = timestamps.len();
    let empty = Best {
        count: 0,
        total: 0.0,
        taken: None,
    };
    // best[i] covers the first i points; clear_of[p] is how many points precede p at a safe distance
    let mut best = vec![empty; n + 1];
    let mut clear_of = vec![0usize; n];
    for point in 0..n {
        let clear = timestamps[..point]
            .iter()
            .rposition(|&t| timestamps[point] - t >= min_distance)
            .map_or(0, |k| k + 1);
        clear_of[point] = clear;
        let prev = best[clear];
        let take = Best {
            count: prev.count + 1,
            total: prev.total + strengths[point].abs(),
            taken: Some(point),
        };
        best[point + 1] = if take.beats(&best[point]) {
            take
        } else {
            best[point]
        };
    }

    let mut kept = Vec::with_capacity(best[n].count);
    let mut i = n;
    while let Some(point) = best[i].taken {
        kept.push(point);
        i = clear_of[point];
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn days(offsets: &[i64]) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2018, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        offsets.iter().map(|&d| start + Duration::days(d)).collect()
    }

    #[test]
    fn test_keep_earlier_chain() {
        // 0, 20, 35, 70: 35 is too close to 20, 70 is clear of 20
        let ts = days(&[0, 20, 35, 70]);
        let kept = post_filter(&ts, &[1.0; 4], Duration::days(30), PostFilter::KeepEarlier).unwrap();
        assert_eq!(kept, vec![0, 2, 3]);
    }

    #[test]
    fn test_keep_earlier_exact_distance_survives() {
        let ts = days(&[0, 30, 59]);
        let kept = post_filter(&ts, &[1.0; 3], Duration::days(30), PostFilter::KeepEarlier).unwrap();
        assert_eq!(kept, vec![0, 1]);
    }

    #[test]
    fn test_keep_stronger_prefers_magnitude() {
        let ts = days(&[0, 10, 20, 60]);
        let strengths = [0.5, -3.0, 1.0, 0.2];
        let kept = post_filter(&ts, &strengths, Duration::days(30), PostFilter::KeepStronger).unwrap();
        assert_eq!(kept, vec![1, 3]);
    }

    #[test]
    fn test_keep_stronger_ties_go_to_earlier() {
        let ts = days(&[0, 10]);
        let kept = post_filter(&ts, &[1.0, -1.0], Duration::days(30), PostFilter::KeepStronger).unwrap();
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn test_min_distance_invariant() {
        let ts = days(&[0, 3, 7, 12, 40, 41, 80, 95, 130]);
        let strengths = [0.3, 2.0, 0.1, 1.5, 0.7, 0.9, 3.0, 0.2, 1.0];
        for policy in [PostFilter::KeepEarlier, PostFilter::KeepStronger] {
            let kept = post_filter(&ts, &strengths, Duration::days(14), policy).unwrap();
            assert!(kept.windows(2).all(|w| ts[w[1]] - ts[w[0]] >= Duration::days(14)));
            assert!(!kept.is_empty());
        }
    }

    #[test]
    fn test_keep_stronger_keeps_the_most_points() {
        // the strong middle point would block both neighbours
        let ts = days(&[0, 20, 40]);
        let kept = post_filter(&ts, &[1.0, 5.0, 1.0], Duration::days(30), PostFilter::KeepStronger).unwrap();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn test_fewer_inputs_never_add_survivors() {
        let ts = days(&[0, 12, 25, 31, 50, 58, 70, 90, 101, 120]);
        let strengths = [0.2, 1.4, 0.3, 2.2, 0.9, 0.1, 1.7, 0.6, 0.8, 0.4];
        for policy in [PostFilter::KeepEarlier, PostFilter::KeepStronger] {
            let full = post_filter(&ts, &strengths, Duration::days(20), policy).unwrap().len();
            // every subset formed by dropping one point
            for drop in 0..ts.len() {
                let sub_ts: Vec<_> = (0..ts.len()).filter(|&i| i != drop).map(|i| ts[i]).collect();
                let sub_s: Vec<_> = (0..ts.len()).filter(|&i| i != drop).map(|i| strengths[i]).collect();
                let fewer = post_filter(&sub_ts, &sub_s, Duration::days(20), policy).unwrap().len();
                assert!(fewer <= full, "{policy:?}: dropping {drop} gave {fewer} > {full}");
            }
        }
    }

    #[test]
    fn test_misaligned_inputs() {
        let ts = days(&[0, 40]);
        assert!(matches!(
            post_filter(&ts, &[1.0], Duration::days(30), PostFilter::KeepStronger),
            Err(ChangepointError::LengthMismatch)
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(post_filter(&[], &[], Duration::days(1), PostFilter::KeepStronger)
            .unwrap()
            .is_empty());
    }
}
