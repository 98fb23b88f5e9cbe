//! Error taxonomy for the ingestion engine.
//!
//! Library code returns [`Error`]; the command-line layer wraps it in
//! `anyhow` with context. Storage back ends report [`StorageError`], which the
//! engine attaches to either a schema change or a batch flush so callers can
//! tell which step of the run was in flight.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Table '{0}' does not exist")]
    MissingTable(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Row has {found} cell(s) but {expected} column(s) were given")]
    RowWidth { expected: usize, found: usize },

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Schema change on table '{table}' failed")]
    Schema {
        table: String,
        #[source]
        source: StorageError,
    },

    #[error("Inserting rows {first_row}-{last_row} of {file:?} failed")]
    Ingest {
        file: PathBuf,
        first_row: usize,
        last_row: usize,
        #[source]
        source: StorageError,
    },

    #[error("Opening {file:?}")]
    Open {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reading {file:?}")]
    Read {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Record {record} of {file:?} is not valid {encoding}")]
    Decode {
        file: PathBuf,
        record: usize,
        encoding: &'static str,
    },

    #[error("Row {row} of {file:?} has {found} cell(s), header declares {expected}")]
    RaggedRow {
        file: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Run cancelled after {rows_committed} row(s) were committed")]
    Cancelled { rows_committed: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
