use std::path::Path;

use itertools::Itertools;
use log::debug;
use rusqlite::{Connection, OptionalExtension, params_from_iter};

use crate::{
    error::StorageError,
    schema::{ColumnSet, SchemaChange},
};

use super::{StorageGateway, check_new_columns, check_row_widths};

/// Bound parameters allowed in one statement by the bundled SQLite.
const MAX_BOUND_PARAMETERS: usize = 32_766;

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        debug!("Opened SQLite database {:?}", path);
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn row_count(&self, table: &str) -> Result<usize, StorageError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    /// Every row of `table` in insertion order; NULL cells read as `None`.
    pub fn fetch_rows(&self, table: &str) -> Result<Vec<Vec<Option<String>>>, StorageError> {
        let columns = self
            .columns_of(table)?
            .ok_or_else(|| StorageError::MissingTable(table.to_string()))?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns.names().iter().map(|c| quote_identifier(c)).join(", "),
            quote_identifier(table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get::<_, Option<String>>(idx))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl StorageGateway for SqliteGateway {
    fn columns_of(&self, table: &str) -> Result<Option<ColumnSet>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        // SQLite tables always have at least one column.
        if names.is_empty() {
            return Ok(None);
        }
        ColumnSet::new(names).map(Some)
    }

    fn apply_schema_change(
        &mut self,
        table: &str,
        change: &SchemaChange,
    ) -> Result<(), StorageError> {
        let quoted_table = quote_identifier(table);
        let statements = match change {
            SchemaChange::Create { columns } => {
                if columns.is_empty() {
                    return Err(StorageError::Rejected(format!(
                        "Table '{table}' needs at least one column"
                    )));
                }
                check_new_columns(&[], columns)?;
                vec![format!(
                    "CREATE TABLE {quoted_table} ({})",
                    columns
                        .iter()
                        .map(|c| format!("{} TEXT", quote_identifier(c)))
                        .join(", ")
                )]
            }
            // SQLite adds one column per ALTER TABLE statement.
            SchemaChange::Extend { columns } => {
                let existing = self
                    .columns_of(table)?
                    .ok_or_else(|| StorageError::MissingTable(table.to_string()))?;
                check_new_columns(existing.names(), columns)?;
                columns
                    .iter()
                    .map(|c| {
                        format!(
                            "ALTER TABLE {quoted_table} ADD COLUMN {} TEXT",
                            quote_identifier(c)
                        )
                    })
                    .collect()
            }
        };
        let tx = self.conn.transaction()?;
        for statement in &statements {
            debug!("{statement}");
            tx.execute(statement, [])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }
        if columns.is_empty() {
            return Err(StorageError::Rejected(format!(
                "No columns given for insert into '{table}'"
            )));
        }
        check_row_widths(columns, rows)?;

        let column_list = columns.iter().map(|c| quote_identifier(c)).join(", ");
        let row_placeholders = format!("({})", std::iter::repeat_n("?", columns.len()).join(", "));
        let rows_per_statement = (MAX_BOUND_PARAMETERS / columns.len()).max(1);

        let tx = self.conn.transaction()?;
        for chunk in rows.chunks(rows_per_statement) {
            let sql = format!(
                "INSERT INTO {} ({column_list}) VALUES {}",
                quote_identifier(table),
                std::iter::repeat_n(row_placeholders.as_str(), chunk.len()).join(", ")
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(chunk.iter().flatten()))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<bool, StorageError> {
        if !self.table_exists(table)? {
            return Ok(false);
        }
        self.conn
            .execute(&format!("DROP TABLE {}", quote_identifier(table)), [])?;
        Ok(true)
    }
}
