use bout_extract::{threshold_bouts, Interval, IntervalSequence, Thresholds};
use proptest::prelude::*;

/// Random sorted sequences, overlaps allowed. Times are multiples of 0.25 so
/// the arithmetic is exact.
fn arb_sequence() -> impl Strategy<Value = IntervalSequence> {
    prop::collection::vec((0u32..400, 0u32..40), 0..30).prop_map(|raw| {
        let intervals = raw
            .into_iter()
            .map(|(start, len)| {
                let start = start as f64 * 0.25;
                Interval::new(start, start + len as f64 * 0.25).unwrap()
            })
            .collect();
        IntervalSequence::from_unsorted(intervals)
    })
}

/// Sorted sequences with non-negative gaps
fn arb_disjoint_sequence() -> impl Strategy<Value = IntervalSequence> {
    prop::collection::vec((0u32..20, 0u32..20), 0..30).prop_map(|raw| {
        let mut cursor = 0.0;
        let mut intervals = Vec::with_capacity(raw.len());
        for (gap, len) in raw {
            let start = cursor + gap as f64 * 0.5;
            let stop = start + len as f64 * 0.5;
            intervals.push(Interval::new(start, stop).unwrap());
            cursor = stop;
        }
        IntervalSequence::from_sorted(intervals).unwrap()
    })
}

fn arb_thresholds() -> impl Strategy<Value = Thresholds> {
    (0u32..20, 0u32..20).prop_map(|(iti, bout)| {
        Thresholds::new(iti as f64 * 0.25, bout as f64 * 0.25).unwrap()
    })
}

proptest! {
    #[test]
    fn output_is_sorted_and_non_overlapping(seq in arb_sequence(), t in arb_thresholds()) {
        let out = threshold_bouts(&seq, &t);
        let slice = out.as_slice();
        prop_assert!(slice.windows(2).all(|w| w[0].start() <= w[1].start()));
        prop_assert!(out.is_non_overlapping());
    }

    #[test]
    fn every_bout_meets_min_length(seq in arb_sequence(), t in arb_thresholds()) {
        let out = threshold_bouts(&seq, &t);
        for bout in &out {
            prop_assert!(bout.duration() >= t.min_bout_length());
        }
    }

    #[test]
    fn every_gap_meets_min_interval(seq in arb_sequence(), t in arb_thresholds()) {
        let out = threshold_bouts(&seq, &t);
        if let Some(gap) = out.min_gap() {
            prop_assert!(gap >= t.min_inter_bout_interval());
        }
    }

    #[test]
    fn thresholding_is_idempotent(seq in arb_sequence(), t in arb_thresholds()) {
        let once = threshold_bouts(&seq, &t);
        let twice = threshold_bouts(&once, &t);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn zero_thresholds_are_identity_on_disjoint_input(seq in arb_disjoint_sequence()) {
        let out = threshold_bouts(&seq, &Thresholds::default());
        prop_assert_eq!(out, seq);
    }

    #[test]
    fn output_never_grows(seq in arb_sequence(), t in arb_thresholds()) {
        prop_assert!(threshold_bouts(&seq, &t).len() <= seq.len());
    }
}
