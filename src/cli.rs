use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{reducer::Reducer, view::ChartConfig};

#[derive(Debug, Parser)]
#[command(author, version, about = "Profile, group, pivot, and forecast spreadsheet data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer column types and summary statistics for every sheet
    Profile(ProfileArgs),
    /// Group rows by one column and reduce a metric per group
    Aggregate(SeriesArgs),
    /// Cross-tabulate a metric by row and column labels
    Pivot(PivotArgs),
    /// Append a forecast tail to an aggregated series
    Splice(SpliceArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input CSV, TSV, or JSON file ('-' reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Sheet to read when the input holds several (defaults to the first)
    #[arg(long)]
    pub sheet: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Emit profiles as JSON
    #[arg(long)]
    pub json: bool,
    /// Emit a compact plain-text summary per sheet
    #[arg(long, conflicts_with = "json")]
    pub summary: bool,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// YAML view file providing defaults for the options below
    #[arg(long)]
    pub view: Option<PathBuf>,
    /// Column whose distinct values define the groups
    #[arg(short = 'g', long = "group-by")]
    pub group_by: Option<String>,
    /// Column holding the numeric metric
    #[arg(short = 'm', long)]
    pub metric: Option<String>,
    /// Reducer applied per group (sum, avg, min, max, count)
    #[arg(short = 'r', long)]
    pub reducer: Option<Reducer>,
    /// Secondary column whose values become stacked, summed channels
    #[arg(short = 'b', long)]
    pub breakdown: Option<String>,
    /// Emit JSON records instead of a table
    #[arg(long)]
    pub json: bool,
}

impl SeriesArgs {
    pub fn overrides(&self) -> ChartConfig {
        ChartConfig {
            sheet: self.input.sheet.clone(),
            group_by: self.group_by.clone(),
            metric: self.metric.clone(),
            reducer: self.reducer,
            breakdown: self.breakdown.clone(),
            ..ChartConfig::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct PivotArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// YAML view file providing defaults for the options below
    #[arg(long)]
    pub view: Option<PathBuf>,
    /// Column providing the row labels
    #[arg(long = "rows")]
    pub rows: Option<String>,
    /// Column providing the column labels (all rows fall under 'Total' when omitted)
    #[arg(long = "columns")]
    pub columns: Option<String>,
    /// Column holding the numeric values
    #[arg(long = "values")]
    pub values: Option<String>,
    /// Reducer applied per cell (sum, avg, min, max, count)
    #[arg(short = 'r', long)]
    pub reducer: Option<Reducer>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl PivotArgs {
    pub fn overrides(&self) -> ChartConfig {
        ChartConfig {
            sheet: self.input.sheet.clone(),
            group_by: self.rows.clone(),
            metric: self.values.clone(),
            reducer: self.reducer,
            columns: self.columns.clone(),
            ..ChartConfig::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct SpliceArgs {
    #[command(flatten)]
    pub series: SeriesArgs,
    /// JSON array of forecast points keyed by the group and metric columns
    #[arg(short = 'f', long)]
    pub forecast: Option<PathBuf>,
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
