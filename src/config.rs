//! Configuration
//!
//! All sections have defaults, so a config file only needs the keys it wants
//! to change. Command-line flags take precedence over file values.

use crate::error::BoutError;
use crate::persist::OutputFormat;
use crate::rank::{EloConfig, MatchTableConfig};
use crate::table::TableConfig;
use crate::types::{Thresholds, TimeUnit};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event table column layout
    pub table: TableConfig,
    /// Default thresholds, in table time units
    pub thresholds: Thresholds,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    /// Elo parameters and match table layout for `bouts elo`
    pub elo: EloConfig,
    pub matches: MatchTableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for saved bout files
    pub directory: PathBuf,
    pub format: OutputFormat,
    pub time_unit: TimeUnit,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            format: OutputFormat::Npy,
            time_unit: TimeUnit::Milliseconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "bout_extract=debug,warn")
    pub level: String,
    /// Whether to output structured JSON logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoutError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, BoutError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Thresholds are validated while deserializing; this checks the rest
    pub fn validate(&self) -> Result<(), BoutError> {
        self.elo.validate()?;
        if !self.table.delimiter.is_ascii() {
            return Err(BoutError::InvalidInput(format!(
                "table.delimiter must be ASCII, got {:?}",
                self.table.delimiter
            )));
        }
        Ok(())
    }
}
