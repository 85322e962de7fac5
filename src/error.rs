//! Error types for bout extraction

use thiserror::Error;

/// Errors that can occur while reading, thresholding or persisting bouts
#[derive(Debug, Error)]
pub enum BoutError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// `line` is the 1-based table line when the interval came from a file
    #[error("Malformed interval: start {start} / stop {stop}{}", at_line(.line))]
    MalformedInterval {
        start: f64,
        stop: f64,
        line: Option<u64>,
    },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Failed to parse event table: {0}")]
    ParseError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn at_line(line: &Option<u64>) -> String {
    match line {
        Some(line) => format!(" (line {})", line),
        None => String::new(),
    }
}
