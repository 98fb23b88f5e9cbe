//! Row normalization.
//!
//! [`normalize_row()`] is the total transform every data row goes through:
//! cells at dropped source positions are removed, cells past the target width
//! are discarded and missing trailing cells become empty strings. It never
//! fails.
//!
//! [`RowLayout`] applies it for one file and then places the cells into the
//! table's column order, so a file whose columns are a reordered subset of the
//! table still lands in the right columns.

use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{error::StorageError, mapping::MappedHeader, schema::ColumnSet};

/// What to do with data rows whose cell count differs from the header's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RaggedRowPolicy {
    /// Truncate long rows and pad short rows with empty strings.
    #[default]
    Lenient,
    /// Reject the file at the first mismatched row.
    Strict,
}

pub fn normalize_row(raw: Vec<String>, excluded: &BTreeSet<usize>, width: usize) -> Vec<String> {
    let mut cells = raw
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !excluded.contains(idx))
        .map(|(_, cell)| cell)
        .take(width)
        .collect::<Vec<_>>();
    cells.resize(width, String::new());
    cells
}

#[derive(Debug, Clone)]
pub struct RowLayout {
    excluded: BTreeSet<usize>,
    source_width: usize,
    placement: Vec<usize>,
    target_width: usize,
    in_order: bool,
}

impl RowLayout {
    /// Every mapped file column must already exist in `table`.
    pub fn new(header: &MappedHeader, table: &ColumnSet) -> Result<Self, StorageError> {
        let placement = header
            .columns
            .iter()
            .map(|column| {
                table
                    .position(column)
                    .ok_or_else(|| StorageError::UnknownColumn {
                        table: table.to_string(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let in_order = placement.iter().enumerate().all(|(idx, pos)| idx == *pos);
        Ok(Self {
            excluded: header.excluded.clone(),
            source_width: header.source_width(),
            placement,
            target_width: table.len(),
            in_order,
        })
    }

    pub fn source_width(&self) -> usize {
        self.source_width
    }

    pub fn target_width(&self) -> usize {
        self.target_width
    }

    pub fn is_ragged(&self, raw: &[String]) -> bool {
        raw.len() != self.source_width
    }

    /// Normalizes `raw` to the file's mapped width and places it into the
    /// table's column order. Table columns the file does not carry are empty.
    pub fn shape(&self, raw: Vec<String>) -> Vec<String> {
        let cells = normalize_row(raw, &self.excluded, self.placement.len());
        if self.in_order {
            let mut cells = cells;
            cells.resize(self.target_width, String::new());
            return cells;
        }
        let mut shaped = vec![String::new(); self.target_width];
        for (cell, position) in cells.into_iter().zip(&self.placement) {
            shaped[*position] = cell;
        }
        shaped
    }
}
