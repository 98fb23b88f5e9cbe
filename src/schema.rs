//! Table column sets and additive schema evolution.
//!
//! A [`ColumnSet`] is the ordered, duplicate-free list of columns a table (or a
//! mapped file header) carries. [`reconcile`] compares the table's current
//! columns with the columns a file needs and asks the storage gateway for the
//! smallest [`SchemaChange`] that makes the table a superset: a create when the
//! table does not exist yet, a single extend otherwise. Existing columns are
//! never renamed, retyped or dropped.

use std::{collections::HashSet, fmt};

use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    error::{Error, Result, StorageError},
    storage::StorageGateway,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnSet {
    columns: Vec<String>,
}

impl ColumnSet {
    /// Builds a column set, rejecting repeated names.
    pub fn new(columns: Vec<String>) -> std::result::Result<Self, StorageError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(StorageError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn names(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Columns of `other` that this set lacks, in `other`'s order.
    pub fn missing_from(&self, other: &ColumnSet) -> Vec<String> {
        let known: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        other
            .columns
            .iter()
            .filter(|column| !known.contains(column.as_str()))
            .cloned()
            .collect()
    }

    fn extended(&self, added: &[String]) -> ColumnSet {
        let mut columns = self.columns.clone();
        columns.extend(added.iter().cloned());
        ColumnSet { columns }
    }

    pub fn into_names(self) -> Vec<String> {
        self.columns
    }
}

impl fmt::Display for ColumnSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.columns.iter().join(", "))
    }
}

/// A typed schema mutation handed to the storage gateway. Every column is
/// created as untyped text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaChange {
    Create { columns: Vec<String> },
    Extend { columns: Vec<String> },
}

impl SchemaChange {
    pub fn columns(&self) -> &[String] {
        match self {
            SchemaChange::Create { columns } | SchemaChange::Extend { columns } => columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub columns: ColumnSet,
    pub change: Option<SchemaChange>,
}

/// Decides which mutation, if any, brings `current` up to `required`.
pub fn plan_change(current: Option<&ColumnSet>, required: &ColumnSet) -> Option<SchemaChange> {
    match current {
        None => Some(SchemaChange::Create {
            columns: required.names().to_vec(),
        }),
        Some(existing) => {
            let added = existing.missing_from(required);
            if added.is_empty() {
                None
            } else {
                Some(SchemaChange::Extend { columns: added })
            }
        }
    }
}

pub fn reconcile<G>(
    gateway: &mut G,
    table: &str,
    current: Option<&ColumnSet>,
    required: &ColumnSet,
) -> Result<Reconciled>
where
    G: StorageGateway + ?Sized,
{
    let change = plan_change(current, required);
    let columns = match (&change, current) {
        (None, Some(existing)) => existing.clone(),
        (Some(SchemaChange::Extend { columns: added }), Some(existing)) => {
            existing.extended(added)
        }
        _ => required.clone(),
    };
    if let Some(change) = &change {
        gateway
            .apply_schema_change(table, change)
            .map_err(|source| Error::Schema {
                table: table.to_string(),
                source,
            })?;
        match change {
            SchemaChange::Create { columns } => info!(
                "Created table '{table}' with {} column(s): {}",
                columns.len(),
                columns.iter().join(", ")
            ),
            SchemaChange::Extend { columns } => info!(
                "Added {} column(s) to '{table}': {}",
                columns.len(),
                columns.iter().join(", ")
            ),
        }
    }
    Ok(Reconciled { columns, change })
}
