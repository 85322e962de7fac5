//! Bout thresholding
//!
//! Cleans a chronological interval sequence in two passes: bouts separated by
//! short inter-bout intervals are merged, then bouts that are still too short
//! are dropped. Merging always runs first so that fragments split by a tiny gap
//! are reunited before their length is judged.

use crate::error::BoutError;
use crate::types::{check_threshold, Interval, IntervalSequence, Thresholds};

/// Merge consecutive intervals whose gap is strictly less than
/// `min_inter_bout_interval`.
///
/// Overlapping intervals have a negative gap and are always merged, so the
/// result never overlaps.
pub fn merge_by_gap(
    intervals: &IntervalSequence,
    min_inter_bout_interval: f64,
) -> Result<IntervalSequence, BoutError> {
    check_threshold("min_inter_bout_interval", min_inter_bout_interval)?;
    Ok(merge_unchecked(intervals, min_inter_bout_interval))
}

/// Drop every interval whose duration is strictly less than `min_bout_length`
pub fn filter_by_duration(
    intervals: &IntervalSequence,
    min_bout_length: f64,
) -> Result<IntervalSequence, BoutError> {
    check_threshold("min_bout_length", min_bout_length)?;
    Ok(filter_unchecked(intervals, min_bout_length))
}

/// Merge by gap, then filter by duration
///
/// Infallible: a [`Thresholds`] value is finite and non-negative however it
/// was built.
pub fn threshold_bouts(intervals: &IntervalSequence, thresholds: &Thresholds) -> IntervalSequence {
    let merged = merge_unchecked(intervals, thresholds.min_inter_bout_interval());
    filter_unchecked(&merged, thresholds.min_bout_length())
}

fn merge_unchecked(intervals: &IntervalSequence, min_gap: f64) -> IntervalSequence {
    let mut iter = intervals.iter().copied();
    let Some(mut current) = iter.next() else {
        return IntervalSequence::empty();
    };

    let mut merged = Vec::with_capacity(intervals.len());
    for next in iter {
        if current.gap_to(&next) < min_gap {
            current = Interval::new_unchecked(current.start(), current.stop().max(next.stop()));
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);

    IntervalSequence::from_sorted_unchecked(merged)
}

fn filter_unchecked(intervals: &IntervalSequence, min_length: f64) -> IntervalSequence {
    IntervalSequence::from_sorted_unchecked(
        intervals
            .iter()
            .filter(|i| i.duration() >= min_length)
            .copied()
            .collect(),
    )
}

/// Reusable thresholder holding validated parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct BoutThresholder {
    thresholds: Thresholds,
}

impl BoutThresholder {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Apply the merge and duration passes to `intervals`
    pub fn apply(&self, intervals: &IntervalSequence) -> IntervalSequence {
        threshold_bouts(intervals, &self.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seq(pairs: &[[f64; 2]]) -> IntervalSequence {
        IntervalSequence::from_pairs(pairs).unwrap()
    }

    fn thresholds(min_iti: f64, min_bout: f64) -> Thresholds {
        Thresholds::new(min_iti, min_bout).unwrap()
    }

    #[test]
    fn test_merge_short_gap_only() {
        // Gap 0.5 < 1 merges, gap 1.0 is not < 1
        let input = seq(&[[0.0, 10.0], [10.5, 20.0], [21.0, 25.0]]);
        let out = threshold_bouts(&input, &thresholds(1.0, 0.0));
        assert_eq!(out.to_array(), vec![[0.0, 20.0], [21.0, 25.0]]);
    }

    #[test]
    fn test_duration_filter_drops_everything() {
        let input = seq(&[[0.0, 2.0], [5.0, 6.0]]);
        let out = threshold_bouts(&input, &thresholds(0.0, 3.0));
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let out = threshold_bouts(&IntervalSequence::empty(), &thresholds(5.0, 5.0));
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_interval_unchanged_by_merge() {
        let input = seq(&[[1.0, 2.0]]);
        assert_eq!(merge_by_gap(&input, 100.0).unwrap(), input);
    }

    #[test]
    fn test_chained_merge() {
        let input = seq(&[[0.0, 1.0], [1.2, 2.0], [2.3, 3.0], [10.0, 11.0]]);
        let out = merge_by_gap(&input, 0.5).unwrap();
        assert_eq!(out.to_array(), vec![[0.0, 3.0], [10.0, 11.0]]);
    }

    #[test]
    fn test_overlap_is_absorbed_even_at_zero() {
        // Second interval is fully contained in the first
        let input = seq(&[[0.0, 10.0], [2.0, 3.0], [12.0, 13.0]]);
        let out = merge_by_gap(&input, 0.0).unwrap();
        assert_eq!(out.to_array(), vec![[0.0, 10.0], [12.0, 13.0]]);
    }

    #[test]
    fn test_touching_intervals_kept_apart_at_zero() {
        let input = seq(&[[0.0, 1.0], [1.0, 2.0]]);
        assert_eq!(merge_by_gap(&input, 0.0).unwrap(), input);
    }

    #[test]
    fn test_merge_before_filter() {
        // Each fragment is 1s long, together they span 2.2s
        let input = seq(&[[0.0, 1.0], [1.2, 2.2]]);
        let out = threshold_bouts(&input, &thresholds(0.5, 2.0));
        assert_eq!(out.to_array(), vec![[0.0, 2.2]]);
    }

    #[test]
    fn test_filter_keeps_exact_length() {
        let input = seq(&[[0.0, 2.0], [3.0, 4.0]]);
        let out = filter_by_duration(&input, 2.0).unwrap();
        assert_eq!(out.to_array(), vec![[0.0, 2.0]]);
    }

    #[test]
    fn test_negative_thresholds_rejected() {
        let input = seq(&[[0.0, 1.0]]);
        assert!(matches!(
            merge_by_gap(&input, -1.0),
            Err(BoutError::InvalidInput(_))
        ));
        assert!(matches!(
            filter_by_duration(&input, -0.5),
            Err(BoutError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_deserialized_thresholds_are_validated() {
        // Deserialization is the only way around Thresholds::new and it validates
        let parsed =
            serde_json::from_str::<Thresholds>(r#"{"min_inter_bout_interval": -2.0}"#);
        assert!(parsed.is_err());

        let input = seq(&[[0.0, 1.0], [5.0, 6.0]]);
        let t: Thresholds =
            serde_json::from_str(r#"{"min_inter_bout_interval": 10.0, "min_bout_length": 0.5}"#)
                .unwrap();
        assert_eq!(threshold_bouts(&input, &t).to_array(), vec![[0.0, 6.0]]);
    }

    #[test]
    fn test_input_not_mutated() {
        let input = seq(&[[0.0, 1.0], [1.1, 2.0]]);
        let before = input.clone();
        let _ = threshold_bouts(&input, &thresholds(1.0, 5.0));
        assert_eq!(input, before);
    }

    #[test]
    fn test_thresholder_matches_free_function() {
        let input = seq(&[[0.0, 1.0], [1.1, 2.0], [5.0, 5.2], [9.0, 12.0]]);
        let t = thresholds(0.5, 1.0);
        let thresholder = BoutThresholder::new(t);
        assert_eq!(thresholder.apply(&input), threshold_bouts(&input, &t));
        assert_eq!(thresholder.apply(&input).to_array(), vec![[0.0, 2.0], [9.0, 12.0]]);
    }
}
