//! bouts CLI - Command-line interface for bout-extract
//!
//! Commands:
//! - extract: Threshold bouts and print a report
//! - save: Threshold bouts and write them to disk
//! - list: List subjects and behaviors in an event table
//! - validate: Check that an event table can be ingested
//! - summary: Per-pair bout statistics
//! - elo: Replay dominance matches into Elo ratings
//! - doctor: Diagnose configuration and input

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bout_extract::logging::init_logging;
use bout_extract::persist::write_extraction;
use bout_extract::rank::read_matches_path;
use bout_extract::{
    extract_behavior_bouts, persist_behavior_bouts, persist_per_pair, replay_matches,
    BoutEncoder, BoutError, BoutQuery, Config, EventTable, OutputFormat, PersistOptions,
    Thresholds, TimeUnit, PRODUCER_NAME, VERSION,
};

/// bouts - Extract thresholded behavior bouts from BORIS event tables
#[derive(Parser)]
#[command(name = "bouts")]
#[command(version = VERSION)]
#[command(about = "Extract thresholded behavior bouts from BORIS event tables", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that selects bouts
#[derive(clap::Args)]
struct SelectArgs {
    /// BORIS aggregated event table (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Subject to extract (repeatable)
    #[arg(short, long = "subject", required = true)]
    subjects: Vec<String>,

    /// Behavior to extract (repeatable)
    #[arg(short, long = "behavior", required = true)]
    behaviors: Vec<String>,

    /// Bouts separated by less than this many seconds are merged
    #[arg(long)]
    min_iti: Option<f64>,

    /// Bouts shorter than this many seconds are discarded
    #[arg(long)]
    min_bout: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Threshold bouts and print a report
    Extract {
        #[command(flatten)]
        select: SelectArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: ReportFormat,

        /// Report times in milliseconds instead of seconds
        #[arg(long)]
        ms: bool,
    },

    /// Threshold bouts and write them to disk
    Save {
        #[command(flatten)]
        select: SelectArgs,

        /// Output directory (defaults to the config file's output.directory)
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// File name (defaults to <subjects>_<behaviors>_bouts.<ext>)
        #[arg(long)]
        filename: Option<String>,

        /// File format
        #[arg(long)]
        format: Option<FileFormat>,

        /// Write one file per subject/behavior pair
        #[arg(long)]
        per_pair: bool,

        /// Save times in seconds instead of milliseconds
        #[arg(long)]
        seconds: bool,
    },

    /// List subjects and behaviors present in an event table
    List {
        /// BORIS aggregated event table (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that an event table can be ingested
    Validate {
        /// BORIS aggregated event table (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Per-pair bout counts and durations
    Summary {
        #[command(flatten)]
        select: SelectArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay dominance matches (one row per match) into Elo ratings
    Elo {
        /// Match table with winner and loser columns
        #[arg(short, long)]
        input: PathBuf,

        /// Winner column (defaults to the config file's matches.winner_column)
        #[arg(long)]
        winner_column: Option<String>,

        /// Loser column
        #[arg(long)]
        loser_column: Option<String>,

        /// Column marking ties
        #[arg(long)]
        tie_column: Option<String>,

        /// Elo K-factor
        #[arg(long)]
        k_factor: Option<f64>,

        /// Print every per-match record as NDJSON instead of final standings
        #[arg(long)]
        records: bool,

        /// Output standings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input
    Doctor {
        /// Event table to check
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// Single-line JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// One JSON object per subject/behavior pair
    Ndjson,
    /// Flattened start,stop rows sorted by start
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum FileFormat {
    /// NumPy (N, 2) float64 array of all bouts
    Npy,
    /// Flattened start,stop rows
    Csv,
    /// Bout report keyed by subject/behavior pair
    Json,
}

impl From<FileFormat> for OutputFormat {
    fn from(f: FileFormat) -> Self {
        match f {
            FileFormat::Npy => OutputFormat::Npy,
            FileFormat::Csv => OutputFormat::Csv,
            FileFormat::Json => OutputFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BoutsCliError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging);

    match cli.command {
        Commands::Extract {
            select,
            output,
            output_format,
            ms,
        } => cmd_extract(&config, &select, &output, output_format, ms),

        Commands::Save {
            select,
            directory,
            filename,
            format,
            per_pair,
            seconds,
        } => {
            let mut options =
                PersistOptions::new(directory.unwrap_or_else(|| config.output.directory.clone()))
                    .with_format(format.map(Into::into).unwrap_or(config.output.format))
                    .with_time_unit(if seconds {
                        TimeUnit::Seconds
                    } else {
                        config.output.time_unit
                    });
            if let Some(name) = filename {
                options = options.with_filename(name);
            }
            cmd_save(&config, &select, &options, per_pair)
        }

        Commands::List { input, json } => cmd_list(&config, &input, json),

        Commands::Validate { input, json } => cmd_validate(&config, &input, json),

        Commands::Summary { select, json } => cmd_summary(&config, &select, json),

        Commands::Elo {
            input,
            winner_column,
            loser_column,
            tie_column,
            k_factor,
            records,
            json,
        } => {
            let mut config = config.clone();
            if let Some(column) = winner_column {
                config.matches.winner_column = column;
            }
            if let Some(column) = loser_column {
                config.matches.loser_column = column;
            }
            if tie_column.is_some() {
                config.matches.tie_column = tie_column;
            }
            if let Some(k) = k_factor {
                config.elo.k_factor = k;
            }
            cmd_elo(&config, &input, records, json)
        }

        Commands::Doctor { input, json } => {
            cmd_doctor(&config, cli.config.as_deref(), input.as_deref(), json)
        }
    }
}

fn read_table(config: &Config, input: &Path) -> Result<EventTable, BoutsCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            tracing::warn!("reading event table from an interactive terminal");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(EventTable::from_csv_reader(buffer.as_bytes(), &config.table)?)
    } else {
        Ok(EventTable::from_csv_path(input, &config.table)?)
    }
}

fn build_query(config: &Config, select: &SelectArgs) -> Result<BoutQuery, BoutsCliError> {
    let thresholds = Thresholds::new(
        select
            .min_iti
            .unwrap_or(config.thresholds.min_inter_bout_interval()),
        select.min_bout.unwrap_or(config.thresholds.min_bout_length()),
    )?;
    Ok(BoutQuery::new(
        select.subjects.clone(),
        select.behaviors.clone(),
        thresholds,
    )?)
}

fn cmd_extract(
    config: &Config,
    select: &SelectArgs,
    output: &Path,
    output_format: ReportFormat,
    ms: bool,
) -> Result<(), BoutsCliError> {
    let table = read_table(config, &select.input)?;
    let query = build_query(config, select)?;
    let extraction = extract_behavior_bouts(&table, &query)?;

    let unit = if ms {
        TimeUnit::Milliseconds
    } else {
        TimeUnit::Seconds
    };
    let encoder = BoutEncoder::new().time_unit(unit);
    let source = select.input.to_string_lossy().into_owned();

    let output_data = match output_format {
        ReportFormat::Json => encoder.encode_to_json(&extraction, Some(source.as_str()))? + "\n",
        ReportFormat::JsonPretty => {
            encoder.encode_to_json_pretty(&extraction, Some(source.as_str()))? + "\n"
        }
        ReportFormat::Ndjson => {
            let report = encoder.encode(&extraction, Some(source.as_str()));
            let mut lines = Vec::with_capacity(report.pairs.len());
            for pair in &report.pairs {
                lines.push(serde_json::to_string(pair)?);
            }
            lines.join("\n") + "\n"
        }
        ReportFormat::Csv => {
            let mut buf = Vec::new();
            write_extraction(&mut buf, &extraction, OutputFormat::Csv, unit)?;
            String::from_utf8_lossy(&buf).into_owned()
        }
    };

    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        stdout.write_all(output_data.as_bytes())?;
        stdout.flush()?;
    } else {
        std::fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_save(
    config: &Config,
    select: &SelectArgs,
    options: &PersistOptions,
    per_pair: bool,
) -> Result<(), BoutsCliError> {
    let table = read_table(config, &select.input)?;
    let query = build_query(config, select)?;

    let paths = if per_pair {
        let extraction = extract_behavior_bouts(&table, &query)?;
        persist_per_pair(&extraction, options)?
    } else {
        vec![persist_behavior_bouts(&table, &query, options)?]
    };

    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_list(config: &Config, input: &Path, json: bool) -> Result<(), BoutsCliError> {
    let table = read_table(config, input)?;
    let listing = TableListing {
        rows: table.len(),
        subjects: table.subjects(),
        behaviors: table.behaviors(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("Rows: {}", listing.rows);
        println!("\nSubjects:");
        for subject in &listing.subjects {
            println!("  - {}", subject);
        }
        println!("\nBehaviors:");
        for behavior in &listing.behaviors {
            println!("  - {}", behavior);
        }
    }
    Ok(())
}

fn cmd_validate(config: &Config, input: &Path, json: bool) -> Result<(), BoutsCliError> {
    let report = match read_table(config, input) {
        Ok(table) => ValidationReport {
            valid: true,
            rows: table.len(),
            subjects: table.subjects().len(),
            behaviors: table.behaviors().len(),
            error: None,
        },
        Err(BoutsCliError::Bout(e)) => ValidationReport {
            valid: false,
            rows: 0,
            subjects: 0,
            behaviors: 0,
            error: Some(e.to_string()),
        },
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Valid:     {}", if report.valid { "yes" } else { "no" });
        println!("Rows:      {}", report.rows);
        println!("Subjects:  {}", report.subjects);
        println!("Behaviors: {}", report.behaviors);
        if let Some(err) = &report.error {
            println!("\nError: {}", err);
        }
    }

    if report.valid {
        Ok(())
    } else {
        Err(BoutsCliError::ValidationFailed)
    }
}

fn cmd_summary(config: &Config, select: &SelectArgs, json: bool) -> Result<(), BoutsCliError> {
    let table = read_table(config, &select.input)?;
    let query = build_query(config, select)?;
    let summaries = extract_behavior_bouts(&table, &query)?.summaries();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        println!(
            "{:<20} {:<20} {:>6} {:>12} {:>10}",
            "subject", "behavior", "bouts", "total (s)", "mean (s)"
        );
        for s in &summaries {
            println!(
                "{:<20} {:<20} {:>6} {:>12.3} {:>10}",
                s.subject,
                s.behavior,
                s.bout_count,
                s.total_duration,
                s.mean_duration
                    .map(|m| format!("{:.3}", m))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
    Ok(())
}

fn cmd_elo(config: &Config, input: &Path, records: bool, json: bool) -> Result<(), BoutsCliError> {
    let matches = read_matches_path(input, &config.matches)?;
    let (history, ratings) = replay_matches(&matches, &config.elo)?;

    if records {
        let mut stdout = io::stdout();
        for record in &history {
            writeln!(stdout, "{}", serde_json::to_string(record)?)?;
        }
        stdout.flush()?;
    } else if json {
        let standings: Vec<_> = ratings
            .standings()
            .into_iter()
            .map(|(id, rating)| serde_json::json!({ "id": id, "rating": rating }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&standings)?);
    } else {
        println!("{:<6} {:<20} {:>10}", "rank", "id", "rating");
        for (rank, (id, rating)) in ratings.standings().iter().enumerate() {
            println!("{:<6} {:<20} {:>10.1}", rank + 1, id, rating);
        }
    }
    Ok(())
}

fn cmd_doctor(
    config: &Config,
    config_path: Option<&Path>,
    input: Option<&Path>,
    json: bool,
) -> Result<(), BoutsCliError> {
    let mut checks = Vec::new();

    checks.push(match config_path {
        Some(path) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!("Loaded {}", path.display()),
        },
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        },
    });

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "settings".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "min_iti={} min_bout={} elo_k={}",
                config.thresholds.min_inter_bout_interval(),
                config.thresholds.min_bout_length(),
                config.elo.k_factor
            ),
        },
        Err(e) => DoctorCheck {
            name: "settings".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let out_dir = &config.output.directory;
    checks.push(if out_dir.is_dir() {
        DoctorCheck {
            name: "output_directory".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} exists", out_dir.display()),
        }
    } else {
        DoctorCheck {
            name: "output_directory".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist and will be created", out_dir.display()),
        }
    });

    if let Some(path) = input {
        checks.push(match read_table(config, path) {
            Ok(table) if table.is_empty() => DoctorCheck {
                name: "input".to_string(),
                status: CheckStatus::Warning,
                message: "Event table has no rows".to_string(),
            },
            Ok(table) => DoctorCheck {
                name: "input".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} rows, {} subjects, {} behaviors",
                    table.len(),
                    table.subjects().len(),
                    table.behaviors().len()
                ),
            },
            Err(e) => DoctorCheck {
                name: "input".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            },
        });
    }

    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdin) {
            "Interactive terminal".to_string()
        } else {
            "Piped input available".to_string()
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };
    let failed = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} {}", report.producer, report.version);
        for check in &report.checks {
            let marker = match check.status {
                CheckStatus::Ok => "ok",
                CheckStatus::Warning => "warn",
                CheckStatus::Error => "FAIL",
            };
            println!("  [{:>4}] {}: {}", marker, check.name, check.message);
        }
    }

    if failed {
        Err(BoutsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum BoutsCliError {
    Io(io::Error),
    Bout(BoutError),
    Json(serde_json::Error),
    ValidationFailed,
    DoctorFailed,
}

impl From<io::Error> for BoutsCliError {
    fn from(e: io::Error) -> Self {
        BoutsCliError::Io(e)
    }
}

impl From<BoutError> for BoutsCliError {
    fn from(e: BoutError) -> Self {
        BoutsCliError::Bout(e)
    }
}

impl From<serde_json::Error> for BoutsCliError {
    fn from(e: serde_json::Error) -> Self {
        BoutsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BoutsCliError> for CliError {
    fn from(e: BoutsCliError) -> Self {
        match e {
            BoutsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BoutsCliError::Bout(e) => {
                let (code, hint) = match &e {
                    BoutError::InvalidInput(_) => (
                        "INVALID_INPUT",
                        "Run 'bouts list' to see available subjects and behaviors",
                    ),
                    BoutError::MalformedInterval { .. } => (
                        "MALFORMED_INTERVAL",
                        "Every event must have stop >= start",
                    ),
                    BoutError::MissingColumn(_) => (
                        "MISSING_COLUMN",
                        "Set table column names in the config file",
                    ),
                    BoutError::ParseError(_) | BoutError::Csv(_) => {
                        ("PARSE_ERROR", "Ensure input is a BORIS aggregated event export")
                    }
                    BoutError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    BoutError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            BoutsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            BoutsCliError::ValidationFailed => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: "Event table failed validation".to_string(),
                hint: Some("Fix the reported row and retry".to_string()),
            },
            BoutsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct TableListing {
    rows: usize,
    subjects: Vec<String>,
    behaviors: Vec<String>,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    valid: bool,
    rows: usize,
    subjects: usize,
    behaviors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
