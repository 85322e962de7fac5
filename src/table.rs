//! BORIS event table ingestion
//!
//! Reads an aggregated BORIS export (one row per state event, with subject,
//! behavior, start and stop columns) into an in-memory table. Only the four
//! columns named in [`TableConfig`] are read; every other column is ignored.

use crate::error::BoutError;
use crate::types::{Interval, IntervalSequence};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Column layout of the event table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub subject_column: String,
    pub behavior_column: String,
    pub start_column: String,
    pub stop_column: String,
    /// Field delimiter, a single ASCII character
    pub delimiter: char,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            subject_column: "Subject".to_string(),
            behavior_column: "Behavior".to_string(),
            start_column: "Start (s)".to_string(),
            stop_column: "Stop (s)".to_string(),
            delimiter: ',',
        }
    }
}

impl TableConfig {
    fn delimiter_byte(&self) -> Result<u8, BoutError> {
        if !self.delimiter.is_ascii() {
            return Err(BoutError::InvalidInput(format!(
                "delimiter must be an ASCII character, got {:?}",
                self.delimiter
            )));
        }
        Ok(self.delimiter as u8)
    }
}

/// One annotated state event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub subject: String,
    pub behavior: String,
    pub start: f64,
    pub stop: f64,
}

impl EventRow {
    pub fn interval(&self) -> Result<Interval, BoutError> {
        Interval::new(self.start, self.stop)
    }
}

/// In-memory event table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    rows: Vec<EventRow>,
}

struct ColumnIndex {
    subject: usize,
    behavior: usize,
    start: usize,
    stop: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, config: &TableConfig) -> Result<Self, BoutError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| BoutError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            subject: find(&config.subject_column)?,
            behavior: find(&config.behavior_column)?,
            start: find(&config.start_column)?,
            stop: find(&config.stop_column)?,
        })
    }
}

impl EventTable {
    /// Build a table from rows, rejecting malformed intervals
    pub fn from_rows(rows: Vec<EventRow>) -> Result<Self, BoutError> {
        for row in &rows {
            row.interval()?;
        }
        Ok(Self { rows })
    }

    /// Read a BORIS export from a CSV/TSV file
    pub fn from_csv_path(path: impl AsRef<Path>, config: &TableConfig) -> Result<Self, BoutError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading event table");
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file, config)
    }

    /// Read a BORIS export from any reader
    pub fn from_csv_reader<R: Read>(reader: R, config: &TableConfig) -> Result<Self, BoutError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(config.delimiter_byte()?)
            .flexible(true)
            .from_reader(reader);

        let columns = ColumnIndex::resolve(reader.headers()?, config)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let row = parse_record(&record, &columns, config, line)?;
            row.interval().map_err(|err| match err {
                BoutError::MalformedInterval { start, stop, .. } => BoutError::MalformedInterval {
                    start,
                    stop,
                    line: Some(line),
                },
                other => other,
            })?;
            rows.push(row);
        }

        debug!(rows = rows.len(), "event table loaded");
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct subjects, sorted
    pub fn subjects(&self) -> Vec<String> {
        distinct(self.rows.iter().map(|r| r.subject.as_str()))
    }

    /// Distinct behaviors, sorted
    pub fn behaviors(&self) -> Vec<String> {
        distinct(self.rows.iter().map(|r| r.behavior.as_str()))
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.rows.iter().any(|r| r.subject == subject)
    }

    pub fn has_behavior(&self, behavior: &str) -> bool {
        self.rows.iter().any(|r| r.behavior == behavior)
    }

    /// Raw intervals for one subject/behavior pair, sorted by start
    pub fn intervals_for(
        &self,
        subject: &str,
        behavior: &str,
    ) -> Result<IntervalSequence, BoutError> {
        let intervals = self
            .rows
            .iter()
            .filter(|r| r.subject == subject && r.behavior == behavior)
            .map(EventRow::interval)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IntervalSequence::from_unsorted(intervals))
    }
}

fn parse_record(
    record: &StringRecord,
    columns: &ColumnIndex,
    config: &TableConfig,
    line: u64,
) -> Result<EventRow, BoutError> {
    let field = |idx: usize, name: &str| {
        record.get(idx).map(str::trim).ok_or_else(|| {
            BoutError::ParseError(format!("line {}: missing value for '{}'", line, name))
        })
    };
    let number = |idx: usize, name: &str| -> Result<f64, BoutError> {
        let raw = field(idx, name)?;
        raw.parse::<f64>().map_err(|_| {
            BoutError::ParseError(format!(
                "line {}: '{}' is not a number in '{}'",
                line, raw, name
            ))
        })
    };

    Ok(EventRow {
        subject: field(columns.subject, &config.subject_column)?.to_string(),
        behavior: field(columns.behavior, &config.behavior_column)?.to_string(),
        start: number(columns.start, &config.start_column)?,
        stop: number(columns.stop, &config.stop_column)?,
    })
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
