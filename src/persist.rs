//! Bout persistence
//!
//! Writes extracted bouts to disk. The default encoding is a NumPy `.npy`
//! file holding the flattened N x 2 array (little-endian `f8`, C order) so
//! downstream analysis can `np.load` it directly. CSV writes the same array
//! with a `start,stop` header. JSON writes the full [`BoutReport`], keyed by
//! pair.
//!
//! Extraction and file-name checks always run before any output file is
//! opened, and files are staged in a temporary file next to the destination
//! and renamed into place, so a failure never leaves a partial file behind.
//!
//! [`BoutReport`]: crate::encoder::BoutReport

use crate::encoder::BoutEncoder;
use crate::error::BoutError;
use crate::extract::{extract_behavior_bouts, BoutExtraction, BoutQuery};
use crate::table::EventTable;
use crate::types::{strip_whitespace, PairKey, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGNMENT: usize = 64;

/// On-disk encoding of extracted bouts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Flattened `(N, 2)` float64 array
    #[default]
    Npy,
    /// Flattened array with a `start,stop` header
    Csv,
    /// Bout report with producer, provenance and per-pair bouts
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Npy => "npy",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Where and how to write bouts
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOptions {
    pub directory: PathBuf,
    /// Explicit file name; derived from the query when `None`
    pub filename: Option<String>,
    pub format: OutputFormat,
    pub time_unit: TimeUnit,
}

impl PersistOptions {
    /// Npy output in milliseconds, the layout existing analysis notebooks expect
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            filename: None,
            format: OutputFormat::Npy,
            time_unit: TimeUnit::Milliseconds,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }
}

/// Default file name `<subjects>_<behaviors>_bouts.<ext>`, whitespace removed
pub fn default_filename(query: &BoutQuery, format: OutputFormat) -> String {
    format!(
        "{}_{}_bouts.{}",
        strip_whitespace(&query.subjects.join("_")),
        strip_whitespace(&query.behaviors.join("_")),
        format.extension()
    )
}

/// Extract bouts for `query` and write them to one file.
///
/// Returns the path written.
pub fn persist_behavior_bouts(
    table: &EventTable,
    query: &BoutQuery,
    options: &PersistOptions,
) -> Result<PathBuf, BoutError> {
    let extraction = extract_behavior_bouts(table, query)?;

    let filename = match &options.filename {
        Some(name) => name.clone(),
        None => {
            let name = default_filename(query, options.format);
            check_derived_name(&name)?;
            name
        }
    };
    let path = options.directory.join(filename);

    write_atomic(&path, &extraction, options.format, options.time_unit)?;
    info!(
        path = %path.display(),
        bouts = extraction.total_bouts(),
        "saved behavior bouts"
    );
    Ok(path)
}

/// Write one `<subject>_<behavior>_bouts.<ext>` file per pair.
///
/// `options.filename` is ignored. Fails with [`BoutError::InvalidInput`]
/// before writing anything if two pairs map to the same file name (names are
/// compared after whitespace removal) or a name contains a path separator.
pub fn persist_per_pair(
    extraction: &BoutExtraction,
    options: &PersistOptions,
) -> Result<Vec<PathBuf>, BoutError> {
    let mut targets: BTreeMap<String, &PairKey> = BTreeMap::new();
    for (key, _) in extraction.pairs() {
        let name = format!("{}.{}", key.file_stem(), options.format.extension());
        check_derived_name(&name)?;
        if let Some(other) = targets.insert(name.clone(), key) {
            return Err(BoutError::InvalidInput(format!(
                "pairs '{}' and '{}' would both be saved as '{}'",
                other, key, name
            )));
        }
    }

    let mut written = Vec::with_capacity(targets.len());
    for (name, key) in targets {
        let Some(single) = extraction.only(key) else {
            continue;
        };
        let path = options.directory.join(name);
        write_atomic(&path, &single, options.format, options.time_unit)?;
        info!(
            path = %path.display(),
            pair = %key,
            bouts = single.total_bouts(),
            "saved pair bouts"
        );
        written.push(path);
    }

    Ok(written)
}

/// File names built from subject/behavior labels must stay inside the
/// output directory
fn check_derived_name(name: &str) -> Result<(), BoutError> {
    if name.chars().any(std::path::is_separator) {
        return Err(BoutError::InvalidInput(format!(
            "file name '{}' derived from subject/behavior labels contains a path separator",
            name
        )));
    }
    Ok(())
}

fn write_atomic(
    path: &Path,
    extraction: &BoutExtraction,
    format: OutputFormat,
    unit: TimeUnit,
) -> Result<(), BoutError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write_extraction(&mut writer, extraction, format, unit)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| BoutError::Io(e.error))?;
    Ok(())
}

/// Encode `extraction` in `format` into `writer`, with times in `unit`
pub fn write_extraction<W: Write>(
    writer: &mut W,
    extraction: &BoutExtraction,
    format: OutputFormat,
    unit: TimeUnit,
) -> Result<(), BoutError> {
    match format {
        OutputFormat::Npy => write_npy(writer, &extraction.flatten(unit)),
        OutputFormat::Csv => write_csv(writer, &extraction.flatten(unit)),
        OutputFormat::Json => {
            let report = BoutEncoder::new().time_unit(unit).encode(extraction, None);
            serde_json::to_writer(&mut *writer, &report)?;
            Ok(())
        }
    }
}

/// Write an `(N, 2)` float64 array in NumPy format version 1.0
pub fn write_npy<W: Write>(writer: &mut W, rows: &[[f64; 2]]) -> Result<(), BoutError> {
    writer.write_all(&npy_header(rows.len()))?;
    for row in rows {
        writer.write_all(&row[0].to_le_bytes())?;
        writer.write_all(&row[1].to_le_bytes())?;
    }
    Ok(())
}

fn npy_header(n_rows: usize) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, 2), }}",
        n_rows
    );
    // magic (6) + version (2) + header length (2)
    let preamble = NPY_MAGIC.len() + 4;
    let unpadded = preamble + dict.len() + 1;
    let padding = (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    let mut bytes = Vec::with_capacity(preamble + header_len);
    bytes.extend_from_slice(NPY_MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    // Shape strings are short, header always fits in u16
    bytes.extend_from_slice(&(header_len as u16).to_le_bytes());
    bytes.extend_from_slice(dict.as_bytes());
    bytes.extend(std::iter::repeat(b' ').take(padding));
    bytes.push(b'\n');
    bytes
}

fn write_csv<W: Write>(writer: &mut W, rows: &[[f64; 2]]) -> Result<(), BoutError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["start", "stop"])?;
    for row in rows {
        csv_writer.write_record([row[0].to_string(), row[1].to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}
