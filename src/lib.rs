pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io_utils;
pub mod mapping;
pub mod report;
pub mod rows;
pub mod schema;
pub mod storage;

use std::{
    env,
    fs::{self, OpenOptions},
    io,
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, DropArgs, ImportArgs, SettingsArgs},
    config::Settings,
    ingest::{IngestOutcome, Ingestor},
    mapping::ColumnTarget,
    storage::{SqliteGateway, StorageGateway},
};

static LOGGER: OnceLock<()> = OnceLock::new();

/// Installs the logger on first use and returns whether this call installed
/// it. Later calls leave the existing logger and its target untouched.
fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<bool> {
    let mut target = match log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Opening log file {path:?}"))?,
        ),
        None => None,
    };
    let mut installed = false;
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if debug {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("csv2table", level);
        }
        if let Some(file) = target.take() {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        match builder.format_timestamp_millis().try_init() {
            Ok(()) => installed = true,
            Err(err) => debug!("Keeping the already installed logger: {err}"),
        }
    });
    if let (Some(path), Some(_)) = (log_file, target) {
        debug!("Logging is already initialised; not writing to {path:?}");
    }
    Ok(installed)
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_file.as_deref())?;
    match &cli.command {
        Commands::Import(args) => handle_import(args),
        Commands::Drop(args) => handle_drop(args),
        Commands::Columns(args) => handle_columns(args),
        Commands::Mappings(args) => handle_mappings(args),
    }
}

fn load_settings(args: &SettingsArgs) -> Result<Settings> {
    Settings::load(&args.config)
        .with_context(|| format!("Loading settings from {:?}", args.config))
}

fn open_gateway(settings: &Settings) -> Result<SqliteGateway> {
    if let Some(parent) = settings.database.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating database directory {parent:?}"))?;
        }
    }
    SqliteGateway::open(&settings.database)
        .with_context(|| format!("Opening database {:?}", settings.database))
}

fn confirm(prompt: &str) -> Result<bool> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    io_utils::confirm(prompt, &mut input, &mut output).context("Reading confirmation")
}

fn drop_table(gateway: &mut SqliteGateway, table: &str) -> Result<()> {
    info!("Deleting table '{table}'");
    let existed = gateway
        .drop_table(table)
        .with_context(|| format!("Dropping table '{table}'"))?;
    if existed {
        info!("Table '{table}' deleted");
    } else {
        info!("Table '{table}' does not exist; nothing to delete");
    }
    Ok(())
}

fn handle_import(args: &ImportArgs) -> Result<()> {
    let settings = load_settings(&args.settings)?;
    let mapping = settings
        .load_mapping()
        .with_context(|| format!("Loading column mappings from {:?}", settings.mapping.path()))?;
    let mut options = settings.ingest_options();
    if let Some(batch_size) = args.batch_size {
        options.batch_size = usize::try_from(batch_size).context("Batch size is too large")?;
    }
    if let Some(policy) = args.ragged_rows {
        options.ragged_rows = policy;
    }

    let mut gateway = open_gateway(&settings)?;
    if args.replace {
        let prompt = format!("Delete all data in table '{}'?", settings.table_name);
        if args.yes || confirm(&prompt)? {
            drop_table(&mut gateway, &settings.table_name)?;
        } else {
            info!("Keeping existing data in '{}'", settings.table_name);
        }
    }

    let files = settings
        .input_files()
        .with_context(|| format!("Listing input files in {:?}", settings.csv_directory))?;
    info!(
        "Importing {} file(s) from {:?} into '{}' ({} row(s) per batch)",
        files.len(),
        settings.csv_directory,
        options.table,
        options.batch_size
    );
    let outcome = Ingestor::new(&mut gateway, &mapping, &options)
        .ingest_files(&files)
        .with_context(|| format!("Importing into table '{}'", options.table))?;
    match outcome {
        IngestOutcome::NothingToDo => {
            info!(
                "No .{} files found in {:?}",
                settings.file_extension, settings.csv_directory
            );
        }
        IngestOutcome::Completed(summary) => {
            print!("{}", report::render_summary(&summary));
            if let Some(path) = &args.summary_json {
                report::write_summary_json(&summary, path)?;
                info!("Run summary written to {:?}", path);
            }
        }
    }
    Ok(())
}

fn handle_drop(args: &DropArgs) -> Result<()> {
    let settings = load_settings(&args.settings)?;
    let mut gateway = open_gateway(&settings)?;
    let prompt = format!("Delete all data in table '{}'?", settings.table_name);
    if args.yes || confirm(&prompt)? {
        drop_table(&mut gateway, &settings.table_name)
    } else {
        info!("Quitting without changes");
        Ok(())
    }
}

fn handle_columns(args: &SettingsArgs) -> Result<()> {
    let settings = load_settings(args)?;
    let gateway = open_gateway(&settings)?;
    let table = settings.table_name.as_str();
    let Some(columns) = gateway
        .columns_of(table)
        .with_context(|| format!("Inspecting table '{table}'"))?
    else {
        println!("Table '{table}' does not exist");
        return Ok(());
    };
    let rows = columns
        .names()
        .iter()
        .enumerate()
        .map(|(idx, name)| vec![(idx + 1).to_string(), name.clone()])
        .collect::<Vec<_>>();
    print!("{}", report::render_columns(&["#", "column"], &rows));
    let row_count = gateway
        .row_count(table)
        .with_context(|| format!("Counting rows of '{table}'"))?;
    println!("{} column(s), {row_count} row(s)", columns.len());
    Ok(())
}

fn handle_mappings(args: &SettingsArgs) -> Result<()> {
    let settings = load_settings(args)?;
    let mapping = settings
        .load_mapping()
        .with_context(|| format!("Loading column mappings from {:?}", settings.mapping.path()))?;
    if mapping.is_empty() {
        println!("No column mappings defined");
        return Ok(());
    }
    let rows = mapping
        .entries()
        .enumerate()
        .map(|(idx, (source, target))| {
            let target = match target {
                ColumnTarget::Keep(name) => name.clone(),
                ColumnTarget::Drop => "(dropped)".to_string(),
            };
            vec![(idx + 1).to_string(), source.to_string(), target]
        })
        .collect::<Vec<_>>();
    print!("{}", report::render_columns(&["#", "source", "target"], &rows));
    Ok(())
}
