//! Elo dominance ranking
//!
//! Social-dominance assays (tube test, reward competition) produce a list of
//! pairwise matches. Each match updates both animals' Elo ratings, and the
//! replay emits one record per animal per match so ratings can be plotted
//! over time next to the behavior bouts.

use crate::error::BoutError;
use crate::types::check_threshold;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Elo parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    /// Development coefficient, usually between 10 and 40
    pub k_factor: f64,
    /// Rating of an animal before its first match
    pub initial_rating: f64,
    /// Ratings are rounded to this many decimals after every update
    pub decimals: u32,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: 20.0,
            initial_rating: 1000.0,
            decimals: 1,
        }
    }
}

impl EloConfig {
    pub fn validate(&self) -> Result<(), BoutError> {
        check_threshold("k_factor", self.k_factor)?;
        if !self.initial_rating.is_finite() {
            return Err(BoutError::InvalidInput(format!(
                "initial_rating must be finite, got {}",
                self.initial_rating
            )));
        }
        Ok(())
    }
}

/// Probability that `subject` beats `agent`
pub fn expected_score(subject_rating: f64, agent_rating: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((agent_rating - subject_rating) / 400.0))
}

/// New rating of `subject` after scoring `score` (1 win, 0.5 tie, 0 loss)
/// against `agent`
pub fn updated_rating(subject_rating: f64, agent_rating: f64, score: f64, config: &EloConfig) -> f64 {
    let rating =
        subject_rating + config.k_factor * (score - expected_score(subject_rating, agent_rating));
    round_to(rating, config.decimals)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// One pairwise match. For a tie, `winner` and `loser` only fix the record
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub winner: String,
    pub loser: String,
    #[serde(default)]
    pub tie: bool,
}

impl Match {
    pub fn win(winner: impl Into<String>, loser: impl Into<String>) -> Self {
        Self {
            winner: winner.into(),
            loser: loser.into(),
            tie: false,
        }
    }

    pub fn tie(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            winner: a.into(),
            loser: b.into(),
            tie: true,
        }
    }

    fn scores(&self) -> (f64, f64) {
        if self.tie {
            (0.5, 0.5)
        } else {
            (1.0, 0.0)
        }
    }
}

/// Rating change of one animal in one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloRecord {
    /// 1-based match number
    pub match_number: usize,
    pub subject_id: String,
    pub agent_id: String,
    pub original_rating: f64,
    pub updated_rating: f64,
    /// 1 win, 0.5 tie, 0 loss
    pub score: f64,
    /// Rank after the match, 1 = highest rating
    pub subject_rank: usize,
    pub agent_rank: usize,
    /// 0 for the winner's record, 1 for the loser's
    pub pairing_index: u8,
}

/// Current ratings, in order of first appearance
#[derive(Debug, Clone, PartialEq)]
pub struct EloRatings {
    config: EloConfig,
    ratings: Vec<(String, f64)>,
    matches: usize,
}

impl EloRatings {
    pub fn new(config: EloConfig) -> Result<Self, BoutError> {
        config.validate()?;
        Ok(Self {
            config,
            ratings: Vec::new(),
            matches: 0,
        })
    }

    pub fn config(&self) -> &EloConfig {
        &self.config
    }

    /// Number of matches recorded so far
    pub fn matches(&self) -> usize {
        self.matches
    }

    /// Rating of `id`, or the initial rating if it has not played
    pub fn rating(&self, id: &str) -> f64 {
        self.position(id)
            .map(|idx| self.ratings[idx].1)
            .unwrap_or(self.config.initial_rating)
    }

    /// Every rated animal with its rating, in order of first appearance
    pub fn ratings(&self) -> &[(String, f64)] {
        &self.ratings
    }

    /// 1-based rank of `id` by descending rating. Equal ratings keep order
    /// of first appearance.
    pub fn rank(&self, id: &str) -> Option<usize> {
        let idx = self.position(id)?;
        let rating = self.ratings[idx].1;
        let ahead = self
            .ratings
            .iter()
            .enumerate()
            .filter(|(i, (_, r))| *r > rating || (*r == rating && *i < idx))
            .count();
        Some(ahead + 1)
    }

    /// Standings sorted by rank
    pub fn standings(&self) -> Vec<(String, f64)> {
        let mut sorted = self.ratings.clone();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted
    }

    /// Apply one match and return the winner's and loser's records
    pub fn record(&mut self, game: &Match) -> Result<[EloRecord; 2], BoutError> {
        if game.winner == game.loser {
            return Err(BoutError::InvalidInput(format!(
                "'{}' cannot play against itself",
                game.winner
            )));
        }

        let winner_idx = self.entry(&game.winner);
        let loser_idx = self.entry(&game.loser);
        let winner_before = self.ratings[winner_idx].1;
        let loser_before = self.ratings[loser_idx].1;
        let (winner_score, loser_score) = game.scores();

        self.ratings[winner_idx].1 =
            updated_rating(winner_before, loser_before, winner_score, &self.config);
        self.ratings[loser_idx].1 =
            updated_rating(loser_before, winner_before, loser_score, &self.config);
        self.matches += 1;

        let winner_rank = self.rank(&game.winner).unwrap_or_default();
        let loser_rank = self.rank(&game.loser).unwrap_or_default();
        debug!(
            match_number = self.matches,
            winner = %game.winner,
            loser = %game.loser,
            tie = game.tie,
            "recorded match"
        );

        Ok([
            EloRecord {
                match_number: self.matches,
                subject_id: game.winner.clone(),
                agent_id: game.loser.clone(),
                original_rating: winner_before,
                updated_rating: self.ratings[winner_idx].1,
                score: winner_score,
                subject_rank: winner_rank,
                agent_rank: loser_rank,
                pairing_index: 0,
            },
            EloRecord {
                match_number: self.matches,
                subject_id: game.loser.clone(),
                agent_id: game.winner.clone(),
                original_rating: loser_before,
                updated_rating: self.ratings[loser_idx].1,
                score: loser_score,
                subject_rank: loser_rank,
                agent_rank: winner_rank,
                pairing_index: 1,
            },
        ])
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.ratings.iter().position(|(name, _)| name == id)
    }

    fn entry(&mut self, id: &str) -> usize {
        match self.position(id) {
            Some(idx) => idx,
            None => {
                self.ratings
                    .push((id.to_string(), self.config.initial_rating));
                self.ratings.len() - 1
            }
        }
    }
}

/// Replay `matches` in order from fresh ratings.
///
/// Returns two records per match (winner first) and the final ratings.
pub fn replay_matches(
    matches: &[Match],
    config: &EloConfig,
) -> Result<(Vec<EloRecord>, EloRatings), BoutError> {
    let mut ratings = EloRatings::new(*config)?;
    let mut records = Vec::with_capacity(matches.len() * 2);
    for game in matches {
        records.extend(ratings.record(game)?);
    }
    info!(
        matches = ratings.matches(),
        animals = ratings.ratings().len(),
        "replayed Elo matches"
    );
    Ok((records, ratings))
}

/// Column layout of a match table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchTableConfig {
    pub winner_column: String,
    pub loser_column: String,
    /// Optional column marking ties. Empty, `0`, `false` and `no` mean "not a
    /// tie"; anything else is a tie.
    pub tie_column: Option<String>,
    pub delimiter: char,
}

impl Default for MatchTableConfig {
    fn default() -> Self {
        Self {
            winner_column: "winner".to_string(),
            loser_column: "loser".to_string(),
            tie_column: None,
            delimiter: ',',
        }
    }
}

/// Read matches from a CSV file
pub fn read_matches_path(
    path: impl AsRef<Path>,
    config: &MatchTableConfig,
) -> Result<Vec<Match>, BoutError> {
    let file = std::fs::File::open(path)?;
    read_matches(file, config)
}

/// Read matches from CSV. Rows with an empty winner cell are skipped.
pub fn read_matches<R: Read>(reader: R, config: &MatchTableConfig) -> Result<Vec<Match>, BoutError> {
    if !config.delimiter.is_ascii() {
        return Err(BoutError::InvalidInput(format!(
            "delimiter must be an ASCII character, got {:?}",
            config.delimiter
        )));
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(config.delimiter as u8)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| BoutError::MissingColumn(name.to_string()))
    };
    let winner_col = find(&config.winner_column)?;
    let loser_col = find(&config.loser_column)?;
    let tie_col = config.tie_column.as_deref().map(find).transpose()?;

    let mut matches = Vec::new();
    for result in reader.records() {
        let record = result?;
        let winner = record.get(winner_col).map(str::trim).unwrap_or_default();
        if winner.is_empty() {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let loser = record.get(loser_col).map(str::trim).unwrap_or_default();
        if loser.is_empty() {
            return Err(BoutError::ParseError(format!(
                "line {}: missing value for '{}'",
                line, config.loser_column
            )));
        }
        let tie = tie_col
            .and_then(|idx| record.get(idx))
            .map(is_truthy)
            .unwrap_or(false);
        matches.push(Match {
            winner: winner.to_string(),
            loser: loser.to_string(),
            tie,
        });
    }

    debug!(matches = matches.len(), "match table loaded");
    Ok(matches)
}

fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim();
    !(cell.is_empty()
        || cell == "0"
        || cell.eq_ignore_ascii_case("false")
        || cell.eq_ignore_ascii_case("no")
        || cell.parse::<f64>().map(|v| v == 0.0).unwrap_or(false))
}
