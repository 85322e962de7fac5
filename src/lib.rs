//! bout-extract - behavior bout extraction for BORIS event tables
//!
//! Reads an aggregated BORIS export, selects the events of each requested
//! subject/behavior pair, and cleans them through a deterministic pipeline:
//! table ingestion → per-pair selection → gap merging → duration filtering →
//! report encoding or `.npy` persistence.
//!
//! Alongside the bout pipeline, [`rank`] replays dominance matches into Elo
//! ratings and [`pose`] derives contact bouts and distances from pose tracks.
//!
//! ```ignore
//! let table = EventTable::from_csv_path("boris.csv", &TableConfig::default())?;
//! let query = BoutQuery::single("mouse 1", "sniffing", Thresholds::new(1.0, 0.5)?)?;
//! let bouts = extract_behavior_bouts(&table, &query)?;
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod extract;
pub mod logging;
pub mod persist;
pub mod pose;
pub mod rank;
pub mod table;
pub mod threshold;
pub mod types;

pub use config::Config;
pub use encoder::{BoutEncoder, BoutReport};
pub use error::BoutError;
pub use extract::{extract_behavior_bouts, BoutExtraction, BoutQuery, BoutSummary};
pub use persist::{persist_behavior_bouts, persist_per_pair, OutputFormat, PersistOptions};
pub use pose::{contact_bouts, contact_frames, Point, PosePair, PoseTrack};
pub use rank::{replay_matches, EloConfig, EloRatings, EloRecord, Match, MatchTableConfig};
pub use table::{EventRow, EventTable, TableConfig};
pub use threshold::{filter_by_duration, merge_by_gap, threshold_bouts, BoutThresholder};
pub use types::{Interval, IntervalSequence, PairKey, Thresholds, TimeUnit};

/// Crate version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "bout-extract";
