//! Core data types
//!
//! This module defines the interval types that flow through the thresholding
//! pipeline, plus the keys and parameters used to select and clean them.

use crate::error::BoutError;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single behavior interval
///
/// Always finite with `start <= stop`. The fields are private and
/// deserialization goes through [`Interval::new`], so every value in
/// circulation satisfies this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    start: f64,
    stop: f64,
}

impl Interval {
    /// Create an interval, rejecting reversed or non-finite endpoints
    pub fn new(start: f64, stop: f64) -> Result<Self, BoutError> {
        if !start.is_finite() || !stop.is_finite() || stop < start {
            return Err(BoutError::MalformedInterval {
                start,
                stop,
                line: None,
            });
        }
        Ok(Self { start, stop })
    }

    /// Callers guarantee `start <= stop` on endpoints taken from valid intervals
    pub(crate) fn new_unchecked(start: f64, stop: f64) -> Self {
        debug_assert!(start <= stop);
        Self { start, stop }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    /// Length of the interval
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Gap between the end of this interval and the start of `next`.
    /// Negative when the two overlap.
    pub fn gap_to(&self, next: &Interval) -> f64 {
        next.start - self.stop
    }

    fn cmp_by_start(&self, other: &Interval) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then(self.stop.total_cmp(&other.stop))
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            start: f64,
            stop: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Interval::new(raw.start, raw.stop).map_err(D::Error::custom)
    }
}

impl From<Interval> for [f64; 2] {
    fn from(interval: Interval) -> Self {
        [interval.start, interval.stop]
    }
}

/// Chronologically ordered intervals for one subject/behavior pair
///
/// Serializes as a plain list. Deserializing rejects lists that are not
/// sorted by start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IntervalSequence(Vec<Interval>);

impl IntervalSequence {
    /// Sequence with no intervals
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a sequence from intervals in any order, sorting by start
    pub fn from_unsorted(mut intervals: Vec<Interval>) -> Self {
        intervals.sort_by(Interval::cmp_by_start);
        Self(intervals)
    }

    /// Build a sequence from intervals that must already be sorted by start
    pub fn from_sorted(intervals: Vec<Interval>) -> Result<Self, BoutError> {
        if let Some(pos) = intervals.windows(2).position(|w| w[1].start < w[0].start) {
            return Err(BoutError::InvalidInput(format!(
                "intervals are not sorted by start at index {}",
                pos + 1
            )));
        }
        Ok(Self(intervals))
    }

    /// Callers guarantee ascending starts
    pub(crate) fn from_sorted_unchecked(intervals: Vec<Interval>) -> Self {
        debug_assert!(intervals.windows(2).all(|w| w[0].start <= w[1].start));
        Self(intervals)
    }

    /// Build a sequence from raw `[start, stop]` pairs, validating each one
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Result<Self, BoutError> {
        let intervals = pairs
            .iter()
            .map(|[start, stop]| Interval::new(*start, *stop))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_unsorted(intervals))
    }

    /// Number of intervals
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Intervals in ascending start order
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.0
    }

    /// Unwrap into the sorted intervals
    pub fn into_vec(self) -> Vec<Interval> {
        self.0
    }

    /// True when no interval starts before its predecessor ends
    pub fn is_non_overlapping(&self) -> bool {
        self.0.windows(2).all(|w| w[0].gap_to(&w[1]) >= 0.0)
    }

    /// Smallest gap between consecutive intervals, if there are at least two
    pub fn min_gap(&self) -> Option<f64> {
        self.0
            .windows(2)
            .map(|w| w[0].gap_to(&w[1]))
            .min_by(f64::total_cmp)
    }

    /// Sum of all interval durations
    pub fn total_duration(&self) -> f64 {
        self.0.iter().map(Interval::duration).sum()
    }

    /// N x 2 array of start/stop pairs
    pub fn to_array(&self) -> Vec<[f64; 2]> {
        self.0.iter().map(|&i| i.into()).collect()
    }

    /// Copy with both endpoints multiplied by `factor`, a positive unit
    /// conversion factor from [`TimeUnit::factor_from_seconds`]
    pub(crate) fn scaled(&self, factor: f64) -> Self {
        debug_assert!(factor > 0.0);
        Self(
            self.0
                .iter()
                .map(|i| Interval::new_unchecked(i.start * factor, i.stop * factor))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for IntervalSequence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let intervals = Vec::<Interval>::deserialize(deserializer)?;
        IntervalSequence::from_sorted(intervals).map_err(D::Error::custom)
    }
}

impl<'a> IntoIterator for &'a IntervalSequence {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Thresholds applied when cleaning bouts
///
/// Both values are in the same unit as the interval times (seconds for BORIS
/// tables). Always finite and non-negative: the only ways in are
/// [`Thresholds::new`], `Default` (both zero) and deserialization, which
/// validates. Missing fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Thresholds {
    min_inter_bout_interval: f64,
    min_bout_length: f64,
}

impl Thresholds {
    pub fn new(min_inter_bout_interval: f64, min_bout_length: f64) -> Result<Self, BoutError> {
        check_threshold("min_inter_bout_interval", min_inter_bout_interval)?;
        check_threshold("min_bout_length", min_bout_length)?;
        Ok(Self {
            min_inter_bout_interval,
            min_bout_length,
        })
    }

    /// Bouts separated by a gap strictly shorter than this are merged
    pub fn min_inter_bout_interval(&self) -> f64 {
        self.min_inter_bout_interval
    }

    /// Bouts strictly shorter than this are discarded after merging
    pub fn min_bout_length(&self) -> f64 {
        self.min_bout_length
    }
}

impl<'de> Deserialize<'de> for Thresholds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Default, Deserialize)]
        #[serde(default)]
        struct Raw {
            min_inter_bout_interval: f64,
            min_bout_length: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Thresholds::new(raw.min_inter_bout_interval, raw.min_bout_length)
            .map_err(D::Error::custom)
    }
}

pub(crate) fn check_threshold(name: &str, value: f64) -> Result<(), BoutError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BoutError::InvalidInput(format!(
            "{} must be a finite value >= 0, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Identifies one subject/behavior pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub subject: String,
    pub behavior: String,
}

impl PairKey {
    pub fn new(subject: impl Into<String>, behavior: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            behavior: behavior.into(),
        }
    }

    /// File stem `<subject>_<behavior>_bouts` with whitespace removed
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_bouts",
            strip_whitespace(&self.subject),
            strip_whitespace(&self.behavior)
        )
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.behavior)
    }
}

pub(crate) fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Time unit of emitted bouts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Unchanged BORIS times
    #[default]
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    /// Factor converting seconds into this unit
    pub fn factor_from_seconds(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1000.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_rejects_reversed_endpoints() {
        let err = Interval::new(5.0, 4.0).unwrap_err();
        assert!(matches!(err, BoutError::MalformedInterval { .. }));
    }

    #[test]
    fn test_interval_rejects_nan() {
        assert!(Interval::new(f64::NAN, 1.0).is_err());
        assert!(Interval::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_point_interval_is_allowed() {
        let point = Interval::new(3.0, 3.0).unwrap();
        assert_eq!(point.duration(), 0.0);
    }

    #[test]
    fn test_from_unsorted_sorts_by_start() {
        let seq = IntervalSequence::from_pairs(&[[5.0, 6.0], [0.0, 1.0], [2.0, 3.0]]).unwrap();
        assert_eq!(seq.to_array(), vec![[0.0, 1.0], [2.0, 3.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_from_sorted_rejects_unsorted() {
        let intervals = vec![
            Interval::new(2.0, 3.0).unwrap(),
            Interval::new(0.0, 1.0).unwrap(),
        ];
        assert!(matches!(
            IntervalSequence::from_sorted(intervals),
            Err(BoutError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_gaps_and_overlap() {
        let seq = IntervalSequence::from_pairs(&[[0.0, 2.0], [1.5, 3.0], [4.0, 5.0]]).unwrap();
        assert!(!seq.is_non_overlapping());
        assert_eq!(seq.min_gap(), Some(-0.5));
        assert_eq!(IntervalSequence::empty().min_gap(), None);
    }

    #[test]
    fn test_scaled_to_milliseconds() {
        let seq = IntervalSequence::from_pairs(&[[0.5, 1.25]]).unwrap();
        let factor = TimeUnit::Milliseconds.factor_from_seconds();
        assert_eq!(seq.scaled(factor).to_array(), vec![[500.0, 1250.0]]);
    }

    #[test]
    fn test_thresholds_reject_negative() {
        assert!(Thresholds::new(-1.0, 0.0).is_err());
        assert!(Thresholds::new(0.0, -0.1).is_err());
        assert!(Thresholds::new(f64::NAN, 0.0).is_err());
        assert!(Thresholds::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_pair_key_file_stem_strips_spaces() {
        let key = PairKey::new("mouse 1", "face sniffing");
        assert_eq!(key.file_stem(), "mouse1_facesniffing_bouts");
        assert_eq!(key.to_string(), "mouse 1/face sniffing");
    }

    #[test]
    fn test_sequence_serializes_as_plain_list() {
        let seq = IntervalSequence::from_pairs(&[[0.0, 1.0]]).unwrap();
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(json, r#"[{"start":0.0,"stop":1.0}]"#);

        let back: IntervalSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seq);
    }

    #[test]
    fn test_reversed_interval_does_not_deserialize() {
        let err = serde_json::from_str::<Interval>(r#"{"start":9.0,"stop":1.0}"#).unwrap_err();
        assert!(err.to_string().contains("Malformed interval"));
    }

    #[test]
    fn test_sequence_deserialize_rejects_bad_intervals_and_order() {
        let reversed = r#"[{"start":9.0,"stop":1.0},{"start":0.0,"stop":2.0}]"#;
        assert!(serde_json::from_str::<IntervalSequence>(reversed).is_err());

        let unsorted = r#"[{"start":5.0,"stop":6.0},{"start":0.0,"stop":2.0}]"#;
        let err = serde_json::from_str::<IntervalSequence>(unsorted).unwrap_err();
        assert!(err.to_string().contains("not sorted"));
    }

    #[test]
    fn test_thresholds_deserialize_validates() {
        let err = serde_json::from_str::<Thresholds>(r#"{"min_inter_bout_interval":-2.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("min_inter_bout_interval"));
        assert!(serde_json::from_str::<Thresholds>(r#"{"min_bout_length":-0.5}"#).is_err());

        let partial: Thresholds = serde_json::from_str(r#"{"min_bout_length":0.5}"#).unwrap();
        assert_eq!(partial, Thresholds::new(0.0, 0.5).unwrap());
        assert_eq!(
            serde_json::from_str::<Thresholds>("{}").unwrap(),
            Thresholds::default()
        );
    }

    #[test]
    fn test_thresholds_round_trip_keeps_names() {
        let t = Thresholds::new(1.5, 0.25).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"min_inter_bout_interval":1.5,"min_bout_length":0.25}"#);
    }
}
