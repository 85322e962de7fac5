//! Behavior bout extraction
//!
//! Selects the rows of an [`EventTable`] for every requested subject/behavior
//! pair and thresholds each pair on its own. Results stay keyed by pair so a
//! multi-subject query never mixes one animal's bouts with another's.

use crate::error::BoutError;
use crate::table::EventTable;
use crate::threshold::BoutThresholder;
use crate::types::{IntervalSequence, PairKey, Thresholds, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Which pairs to extract and how to clean them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoutQuery {
    pub subjects: Vec<String>,
    pub behaviors: Vec<String>,
    pub thresholds: Thresholds,
}

impl BoutQuery {
    pub fn new(
        subjects: Vec<String>,
        behaviors: Vec<String>,
        thresholds: Thresholds,
    ) -> Result<Self, BoutError> {
        let query = Self {
            subjects: dedup_in_order(subjects),
            behaviors: dedup_in_order(behaviors),
            thresholds,
        };
        query.validate()?;
        Ok(query)
    }

    /// Query for a single pair
    pub fn single(
        subject: impl Into<String>,
        behavior: impl Into<String>,
        thresholds: Thresholds,
    ) -> Result<Self, BoutError> {
        Self::new(vec![subject.into()], vec![behavior.into()], thresholds)
    }

    /// Check that at least one subject and one behavior are requested.
    ///
    /// The fields are public, so [`extract_behavior_bouts`] calls this again
    /// on every query it receives.
    pub fn validate(&self) -> Result<(), BoutError> {
        if self.subjects.is_empty() {
            return Err(BoutError::InvalidInput(
                "at least one subject is required".to_string(),
            ));
        }
        if self.behaviors.is_empty() {
            return Err(BoutError::InvalidInput(
                "at least one behavior is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Every requested subject x behavior pair
    pub fn pairs(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.subjects.iter().flat_map(move |subject| {
            self.behaviors
                .iter()
                .map(move |behavior| PairKey::new(subject.as_str(), behavior.as_str()))
        })
    }
}

fn dedup_in_order(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Thresholded bouts keyed by subject/behavior pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoutExtraction {
    thresholds: Thresholds,
    bouts: BTreeMap<PairKey, IntervalSequence>,
}

/// Per-pair bout statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoutSummary {
    pub subject: String,
    pub behavior: String,
    pub bout_count: usize,
    pub total_duration: f64,
    /// `None` when the pair has no bouts
    pub mean_duration: Option<f64>,
}

impl BoutExtraction {
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn get(&self, subject: &str, behavior: &str) -> Option<&IntervalSequence> {
        self.bouts.get(&PairKey::new(subject, behavior))
    }

    /// Pairs in (subject, behavior) order
    pub fn pairs(&self) -> impl Iterator<Item = (&PairKey, &IntervalSequence)> {
        self.bouts.iter()
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.bouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bouts.is_empty()
    }

    /// Number of bouts across all pairs
    pub fn total_bouts(&self) -> usize {
        self.bouts.values().map(IntervalSequence::len).sum()
    }

    /// All pairs concatenated into one N x 2 array sorted by start.
    ///
    /// Subject/behavior attribution is lost; prefer [`BoutExtraction::pairs`]
    /// for multi-pair queries.
    pub fn flatten(&self, unit: TimeUnit) -> Vec<[f64; 2]> {
        let factor = unit.factor_from_seconds();
        let mut rows: Vec<[f64; 2]> = self
            .bouts
            .values()
            .flat_map(|seq| seq.iter())
            .map(|i| [i.start() * factor, i.stop() * factor])
            .collect();
        rows.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
        rows
    }

    /// Sub-extraction holding only `key`, if it was extracted
    pub fn only(&self, key: &PairKey) -> Option<BoutExtraction> {
        self.bouts.get(key).map(|seq| BoutExtraction {
            thresholds: self.thresholds,
            bouts: BTreeMap::from([(key.clone(), seq.clone())]),
        })
    }

    pub fn summaries(&self) -> Vec<BoutSummary> {
        self.bouts
            .iter()
            .map(|(key, seq)| {
                let total_duration = seq.total_duration();
                BoutSummary {
                    subject: key.subject.clone(),
                    behavior: key.behavior.clone(),
                    bout_count: seq.len(),
                    total_duration,
                    mean_duration: (!seq.is_empty()).then(|| total_duration / seq.len() as f64),
                }
            })
            .collect()
    }
}

/// Extract and threshold bouts for every pair in `query`.
///
/// Fails with [`BoutError::InvalidInput`] if any requested subject or behavior
/// has no rows in `table`. A pair whose subject and behavior both exist but
/// never co-occur yields an empty sequence.
pub fn extract_behavior_bouts(
    table: &EventTable,
    query: &BoutQuery,
) -> Result<BoutExtraction, BoutError> {
    query.validate()?;

    if let Some(subject) = query.subjects.iter().find(|s| !table.has_subject(s)) {
        return Err(BoutError::InvalidInput(format!(
            "subject '{}' not found in event table",
            subject
        )));
    }
    if let Some(behavior) = query.behaviors.iter().find(|b| !table.has_behavior(b)) {
        return Err(BoutError::InvalidInput(format!(
            "behavior '{}' not found in event table",
            behavior
        )));
    }

    let thresholder = BoutThresholder::new(query.thresholds);
    let mut bouts = BTreeMap::new();

    for key in query.pairs() {
        let raw = table.intervals_for(&key.subject, &key.behavior)?;
        let cleaned = thresholder.apply(&raw);
        if raw.is_empty() {
            warn!(pair = %key, "no events for pair");
        } else {
            debug!(pair = %key, raw = raw.len(), kept = cleaned.len(), "thresholded pair");
        }
        bouts.insert(key, cleaned);
    }

    let extraction = BoutExtraction {
        thresholds: query.thresholds,
        bouts,
    };
    info!(
        pairs = extraction.len(),
        bouts = extraction.total_bouts(),
        min_inter_bout_interval = query.thresholds.min_inter_bout_interval(),
        min_bout_length = query.thresholds.min_bout_length(),
        "extracted behavior bouts"
    );
    Ok(extraction)
}
