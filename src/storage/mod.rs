//! Destination table access.
//!
//! The ingestion engine never builds statement text itself; it hands typed
//! requests to a [`StorageGateway`], which owns identifier quoting and
//! execution. Every call is atomic from the engine's point of view.
//!
//! - [`SqliteGateway`]: a SQLite database file (or in-memory database).
//! - [`MemoryGateway`]: in-process tables that record every mutation and
//!   insert, with optional failure injection.

mod memory;
mod sqlite;

pub use memory::{MemoryGateway, MemoryTable};
pub use sqlite::{SqliteGateway, quote_identifier};

use std::collections::HashSet;

use crate::{
    error::StorageError,
    schema::{ColumnSet, SchemaChange},
};

pub trait StorageGateway {
    /// Current columns of `table`, or `None` when the table does not exist.
    fn columns_of(&self, table: &str) -> Result<Option<ColumnSet>, StorageError>;

    fn apply_schema_change(
        &mut self,
        table: &str,
        change: &SchemaChange,
    ) -> Result<(), StorageError>;

    /// Inserts `rows` into `columns` of `table`; every row carries exactly one
    /// cell per column, in column order.
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), StorageError>;

    /// Returns whether the table existed.
    fn drop_table(&mut self, table: &str) -> Result<bool, StorageError>;

    fn create_table(&mut self, table: &str, columns: &[String]) -> Result<(), StorageError> {
        self.apply_schema_change(
            table,
            &SchemaChange::Create {
                columns: columns.to_vec(),
            },
        )
    }

    fn add_columns(&mut self, table: &str, columns: &[String]) -> Result<(), StorageError> {
        self.apply_schema_change(
            table,
            &SchemaChange::Extend {
                columns: columns.to_vec(),
            },
        )
    }
}

/// Rejects `added` names that repeat each other or `existing` once ASCII case is
/// folded, the way SQLite compares identifiers.
fn check_new_columns(existing: &[String], added: &[String]) -> Result<(), StorageError> {
    let mut seen = existing
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect::<HashSet<_>>();
    match added
        .iter()
        .find(|name| !seen.insert(name.to_ascii_lowercase()))
    {
        Some(name) => Err(StorageError::DuplicateColumn(name.clone())),
        None => Ok(()),
    }
}

fn check_row_widths(columns: &[String], rows: &[Vec<String>]) -> Result<(), StorageError> {
    match rows.iter().find(|row| row.len() != columns.len()) {
        Some(row) => Err(StorageError::RowWidth {
            expected: columns.len(),
            found: row.len(),
        }),
        None => Ok(()),
    }
}
