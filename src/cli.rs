use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{ingest::LayoutMode, normalize::CollisionPolicy, report::ReportFormat};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer field mapping rules between a legacy export and a target table",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify every target field as CONST, DIRECT, LOGIC, DOMINANT or UNKNOWN
    Analyze(AnalyzeArgs),
    /// Write the joined legacy/target record set as CSV
    Align(AlignArgs),
    /// List legacy columns with their cardinality and predictor verdict
    Profile(ProfileArgs),
}

/// Inputs shared by every command.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Legacy export (CSV, TSV or workbook)
    #[arg(short = 'l', long = "legacy")]
    pub legacy: PathBuf,
    /// Target table (CSV, TSV or workbook)
    #[arg(short = 't', long = "target")]
    pub target: PathBuf,
    /// Worksheet to read from a legacy workbook (defaults to the first)
    #[arg(long = "legacy-sheet")]
    pub legacy_sheet: Option<String>,
    /// Primary worksheet to read from a target workbook (defaults to the first)
    #[arg(long = "target-sheet")]
    pub target_sheet: Option<String>,
    /// Additional target worksheets to left-join onto the primary one
    #[arg(long = "merge-sheet", action = clap::ArgAction::Append)]
    pub merge_sheets: Vec<String>,
    /// Join key columns (comma-separated or repeated); resolved automatically when omitted
    #[arg(short = 'k', long = "key", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub keys: Vec<String>,
    /// Optional YAML file with analysis settings
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Sheet layout of the inputs
    #[arg(long, value_enum, default_value_t = LayoutMode::Auto)]
    pub layout: LayoutMode,
    /// How to treat two headers that normalize to the same name
    #[arg(long = "header-collisions", value_enum)]
    pub header_collisions: Option<CollisionPolicy>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

/// Classifier settings that override the config file.
#[derive(Debug, Args, Default)]
pub struct TuningArgs {
    /// Dominant-value share (percent) that triggers the exception search
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Maximum distinct/rows ratio for a predictor column
    #[arg(long = "max-ratio")]
    pub max_ratio: Option<f64>,
    /// Row count at or below which the ratio gate is waived
    #[arg(long = "small-sample")]
    pub small_sample: Option<usize>,
    /// Target fields to leave out of the analysis
    #[arg(long = "skip", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub skip: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    #[command(flatten)]
    pub tuning: TuningArgs,
    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
    pub format: ReportFormat,
    /// Report destination (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AlignArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to comma)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
    #[command(flatten)]
    pub tuning: TuningArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
