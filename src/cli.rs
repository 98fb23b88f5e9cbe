use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::rows::RaggedRowPolicy;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load a directory of CSV files into a single SQL table",
    long_about = None
)]
pub struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,
    /// Append log output to this file instead of stderr
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import every CSV file of the configured directory into the table
    Import(ImportArgs),
    /// Drop the configured table
    Drop(DropArgs),
    /// List the columns of the configured table
    Columns(SettingsArgs),
    /// List the entries of the column mapping table
    Mappings(SettingsArgs),
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Settings file (YAML)
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,
    /// Drop the table before importing
    #[arg(long)]
    pub replace: bool,
    /// Do not ask for confirmation before dropping the table
    #[arg(short = 'y', long)]
    pub yes: bool,
    /// Rows per insert statement (overrides the settings file)
    #[arg(long = "batch-size", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,
    /// How to treat rows whose cell count differs from the header
    #[arg(long = "ragged-rows", value_enum)]
    pub ragged_rows: Option<RaggedRowPolicy>,
    /// Write the run summary as JSON to this path
    #[arg(long = "summary-json")]
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DropArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,
    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
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
