use std::collections::BTreeMap;

use crate::{
    error::StorageError,
    schema::{ColumnSet, SchemaChange},
};

use super::{StorageGateway, check_new_columns, check_row_widths};

/// A table held in memory. Cells the table gained after a row was inserted
/// read as `None`, the way a SQL column added later reads as NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl MemoryTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Rows padded to the table's current width.
    pub fn widened_rows(&self) -> Vec<Vec<Option<String>>> {
        self.rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.resize(self.columns.len(), None);
                row
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: BTreeMap<String, MemoryTable>,
    schema_changes: Vec<(String, SchemaChange)>,
    insert_batches: Vec<usize>,
    fail_insert_call: Option<usize>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an existing table without recording a schema change.
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Makes the `call`-th insert (1-based) and every later one fail.
    pub fn with_insert_failure(mut self, call: usize) -> Self {
        self.fail_insert_call = Some(call);
        self
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    pub fn schema_changes(&self) -> &[(String, SchemaChange)] {
        &self.schema_changes
    }

    /// Row count of every successful insert call, in call order.
    pub fn insert_batches(&self) -> &[usize] {
        &self.insert_batches
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, StorageError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::MissingTable(name.to_string()))
    }
}

impl StorageGateway for MemoryGateway {
    fn columns_of(&self, table: &str) -> Result<Option<ColumnSet>, StorageError> {
        self.tables
            .get(table)
            .map(|t| ColumnSet::new(t.columns.clone()))
            .transpose()
    }

    fn apply_schema_change(
        &mut self,
        table: &str,
        change: &SchemaChange,
    ) -> Result<(), StorageError> {
        match change {
            SchemaChange::Create { columns } => {
                if self.tables.contains_key(table) {
                    return Err(StorageError::TableExists(table.to_string()));
                }
                if columns.is_empty() {
                    return Err(StorageError::Rejected(format!(
                        "Table '{table}' needs at least one column"
                    )));
                }
                check_new_columns(&[], columns)?;
                let columns = columns.clone();
                self.tables.insert(
                    table.to_string(),
                    MemoryTable {
                        columns,
                        rows: Vec::new(),
                    },
                );
            }
            SchemaChange::Extend { columns } => {
                let target = self.table_mut(table)?;
                check_new_columns(&target.columns, columns)?;
                target.columns.extend(columns.iter().cloned());
            }
        }
        self.schema_changes
            .push((table.to_string(), change.clone()));
        Ok(())
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), StorageError> {
        let call = self.insert_batches.len() + 1;
        if self.fail_insert_call.is_some_and(|fail_at| call >= fail_at) {
            return Err(StorageError::Rejected(format!(
                "Injected failure on insert call {call}"
            )));
        }
        check_row_widths(columns, rows)?;
        let target = self.table_mut(table)?;
        let positions = columns
            .iter()
            .map(|column| {
                target
                    .columns
                    .iter()
                    .position(|existing| existing == column)
                    .ok_or_else(|| StorageError::UnknownColumn {
                        table: table.to_string(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let width = target.columns.len();
        for row in rows {
            let mut stored = vec![None; width];
            for (cell, position) in row.iter().zip(&positions) {
                stored[*position] = Some(cell.clone());
            }
            target.rows.push(stored);
        }
        self.insert_batches.push(rows.len());
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<bool, StorageError> {
        Ok(self.tables.remove(table).is_some())
    }
}
