use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::resolver::YoyAnchor;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Resolve monthly metro rent series into upsert SQL and a growth summary",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the upsert SQL and summary report for a target month
    Process(ProcessArgs),
    /// Print the summary report without writing files
    Summary(RunArgs),
    /// Print every resolved market, including the dates actually used
    Markets(MarketsArgs),
    /// Write the default configuration as YAML
    Config(ConfigArgs),
}

/// Options shared by every command that resolves markets.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Input CSV of monthly values per region (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration file; flags override its values
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Month to resolve (YYYY-MM-DD); defaults to the newest month column
    #[arg(short = 't', long = "target-month", value_parser = parse_target_month)]
    pub target_month: Option<NaiveDate>,
    /// Months to look back when the target month has no value
    #[arg(long = "max-lookback", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_lookback: Option<u16>,
    /// RegionType to keep (e.g. msa, country); `all` keeps every row
    #[arg(long = "region-type")]
    pub region_type: Option<String>,
    /// How the year-ago column is located
    #[arg(long = "yoy-anchor", value_enum)]
    pub yoy_anchor: Option<YoyAnchor>,
    /// Number of markets in the fastest-growing list
    #[arg(long)]
    pub top: Option<usize>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub run: RunArgs,
    /// Directory for the default output file names
    #[arg(short = 'd', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,
    /// SQL output path (`-` for stdout)
    #[arg(long = "sql-output")]
    pub sql_output: Option<PathBuf>,
    /// Summary report output path
    #[arg(long = "summary-output")]
    pub summary_output: Option<PathBuf>,
    /// Also write the resolved markets as JSON
    #[arg(long = "results-json")]
    pub results_json: Option<PathBuf>,
    /// Destination table for the upsert
    #[arg(long)]
    pub table: Option<String>,
    /// Rows per INSERT statement (0 = single statement)
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,
    /// Leave the processing timestamp out of the SQL header
    #[arg(long = "omit-timestamp")]
    pub omit_timestamp: bool,
}

#[derive(Debug, Args)]
pub struct MarketsArgs {
    #[command(flatten)]
    pub run: RunArgs,
    /// Limit number of markets displayed
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Destination YAML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

pub fn parse_target_month(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("Expected a date like 2025-08-31: {err}"))
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
