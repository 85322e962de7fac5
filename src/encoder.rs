//! Bout report encoding
//!
//! Turns a [`BoutExtraction`] into a self-describing JSON report carrying
//! producer metadata, provenance and the per-pair bouts.

use crate::error::BoutError;
use crate::extract::BoutExtraction;
use crate::types::{Thresholds, TimeUnit};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProvenance {
    /// Event table the bouts were read from, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub computed_at_utc: String,
}

/// Bouts of one subject/behavior pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub subject: String,
    pub behavior: String,
    pub bout_count: usize,
    pub total_duration: f64,
    pub bouts: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoutReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub thresholds: Thresholds,
    pub time_unit: TimeUnit,
    pub pairs: Vec<PairReport>,
}

/// Encoder for bout reports
pub struct BoutEncoder {
    instance_id: String,
    time_unit: TimeUnit,
}

impl Default for BoutEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BoutEncoder {
    /// Create a new encoder with a unique instance ID, reporting seconds
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            time_unit: TimeUnit::Seconds,
        }
    }

    /// Create an encoder with a fixed instance ID, e.g. to keep reports
    /// from one long-running process attributable to it
    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            ..Self::new()
        }
    }

    pub fn time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    pub fn encode(&self, extraction: &BoutExtraction, source: Option<&str>) -> BoutReport {
        let factor = self.time_unit.factor_from_seconds();
        let pairs = extraction
            .pairs()
            .map(|(key, seq)| {
                let scaled = seq.scaled(factor);
                PairReport {
                    subject: key.subject.clone(),
                    behavior: key.behavior.clone(),
                    bout_count: scaled.len(),
                    total_duration: scaled.total_duration(),
                    bouts: scaled.to_array(),
                }
            })
            .collect();

        BoutReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: ReportProvenance {
                source: source.map(str::to_string),
                computed_at_utc: Utc::now().to_rfc3339(),
            },
            thresholds: *extraction.thresholds(),
            time_unit: self.time_unit,
            pairs,
        }
    }

    pub fn encode_to_json(
        &self,
        extraction: &BoutExtraction,
        source: Option<&str>,
    ) -> Result<String, BoutError> {
        Ok(serde_json::to_string(&self.encode(extraction, source))?)
    }

    pub fn encode_to_json_pretty(
        &self,
        extraction: &BoutExtraction,
        source: Option<&str>,
    ) -> Result<String, BoutError> {
        Ok(serde_json::to_string_pretty(&self.encode(extraction, source))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_behavior_bouts, BoutQuery};
    use crate::table::{EventRow, EventTable};

    fn extraction() -> BoutExtraction {
        let table = EventTable::from_rows(vec![
            EventRow {
                subject: "m1".to_string(),
                behavior: "sniff".to_string(),
                start: 1.0,
                stop: 2.5,
            },
            EventRow {
                subject: "m1".to_string(),
                behavior: "sniff".to_string(),
                start: 4.0,
                stop: 5.0,
            },
        ])
        .unwrap();
        let query = BoutQuery::single("m1", "sniff", Thresholds::default()).unwrap();
        extract_behavior_bouts(&table, &query).unwrap()
    }

    #[test]
    fn test_encode_report() {
        let encoder = BoutEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(&extraction(), Some("boris.csv"));

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.provenance.source.as_deref(), Some("boris.csv"));
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.pairs[0].bouts, vec![[1.0, 2.5], [4.0, 5.0]]);
        assert_eq!(report.pairs[0].bout_count, 2);
    }

    #[test]
    fn test_milliseconds_report() {
        let encoder = BoutEncoder::new().time_unit(TimeUnit::Milliseconds);
        let report = encoder.encode(&extraction(), None);
        assert_eq!(report.time_unit, TimeUnit::Milliseconds);
        assert_eq!(report.pairs[0].bouts[0], [1000.0, 2500.0]);
        assert!((report.pairs[0].total_duration - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_roundtrips_into_report() {
        let json = BoutEncoder::new().encode_to_json(&extraction(), None).unwrap();
        let parsed: BoutReport = serde_json::from_str(&json).unwrap();
        assert!(parsed.provenance.source.is_none());
        assert!(!json.contains("\"source\""));
        assert_eq!(parsed.time_unit, TimeUnit::Seconds);
    }
}
