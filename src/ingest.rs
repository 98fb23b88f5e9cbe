//! Multi-file ingestion.
//!
//! An [`Ingestor`] walks an ordered list of files and, for each one, maps the
//! header, reconciles the table schema, and streams the data rows through the
//! row layout into a [`BatchWriter`]. The authoritative [`ColumnSet`] is read
//! from the table once and then carried from file to file.
//!
//! Files are processed strictly one at a time and rows strictly in file order.
//! An optional cancellation flag is checked between files and after each
//! flushed batch, never while a batch is partially filled.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    batch::{BatchWriter, DEFAULT_BATCH_SIZE},
    error::{Error, Result, StorageError},
    io_utils,
    mapping::ColumnMapping,
    rows::{RaggedRowPolicy, RowLayout},
    schema::{self, ColumnSet, SchemaChange},
    storage::StorageGateway,
};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub table: String,
    pub batch_size: usize,
    pub ragged_rows: RaggedRowPolicy,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl IngestOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            ragged_rows: RaggedRowPolicy::default(),
            delimiter: None,
            encoding: UTF_8,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_ragged_rows(mut self, policy: RaggedRowPolicy) -> Self {
        self.ragged_rows = policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub rows: usize,
    pub ragged_rows: usize,
    pub schema_change: Option<SchemaChange>,
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub table: String,
    pub files: Vec<FileReport>,
    pub total_rows: usize,
    pub columns: ColumnSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    NothingToDo,
    Completed(RunSummary),
}

impl IngestOutcome {
    pub fn total_rows(&self) -> usize {
        match self {
            IngestOutcome::NothingToDo => 0,
            IngestOutcome::Completed(summary) => summary.total_rows,
        }
    }
}

pub struct Ingestor<'a, G: StorageGateway + ?Sized> {
    gateway: &'a mut G,
    mapping: &'a ColumnMapping,
    options: &'a IngestOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, G: StorageGateway + ?Sized> Ingestor<'a, G> {
    pub fn new(gateway: &'a mut G, mapping: &'a ColumnMapping, options: &'a IngestOptions) -> Self {
        Self {
            gateway,
            mapping,
            options,
            cancel: None,
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Ingests `files` in the given order.
    pub fn ingest_files(&mut self, files: &[PathBuf]) -> Result<IngestOutcome> {
        if files.is_empty() {
            info!("No input files to ingest");
            return Ok(IngestOutcome::NothingToDo);
        }
        let options = self.options;
        let table = options.table.as_str();
        let mut current = self.gateway.columns_of(table)?;
        match &current {
            Some(columns) => debug!("Table '{table}' has {} column(s): {columns}", columns.len()),
            None => debug!("Table '{table}' does not exist yet"),
        }

        let mut reports = Vec::with_capacity(files.len());
        let mut total_rows = 0usize;
        for (idx, file) in files.iter().enumerate() {
            check_cancelled(self.cancel.as_deref(), total_rows)?;
            info!("Reading file {:?} ({}/{})", file, idx + 1, files.len());
            let records = io_utils::read_records(file, options.delimiter, options.encoding)?;
            let (columns, report) = self.ingest_records(file, current, records, total_rows)?;
            total_rows += report.rows;
            current = columns;
            reports.push(report);
        }
        info!("{total_rows} row(s) added to '{table}'");
        Ok(IngestOutcome::Completed(RunSummary {
            table: table.to_string(),
            files: reports,
            total_rows,
            columns: current.unwrap_or_default(),
        }))
    }

    /// Ingests one file's records (header first) against `current`, returning
    /// the updated column set. `run_rows` counts rows committed earlier in the
    /// run.
    pub fn ingest_records<I>(
        &mut self,
        file: &Path,
        current: Option<ColumnSet>,
        records: I,
        run_rows: usize,
    ) -> Result<(Option<ColumnSet>, FileReport)>
    where
        I: IntoIterator<Item = Result<Vec<String>>>,
    {
        let options = self.options;
        let table = options.table.as_str();
        let mut records = records.into_iter();
        let header = match records.next() {
            Some(header) => header?,
            None => {
                warn!("{:?} has no header row; skipping", file);
                return Ok((
                    current,
                    FileReport {
                        file: file.to_path_buf(),
                        rows: 0,
                        ragged_rows: 0,
                        schema_change: None,
                        skipped: true,
                    },
                ));
            }
        };

        let mapped = self.mapping.apply(&header);
        debug!(
            "{:?}: {} column(s) kept, source position(s) {:?} dropped",
            file,
            mapped.columns.len(),
            mapped.excluded
        );
        let schema_error = |source: StorageError| Error::Schema {
            table: table.to_string(),
            source,
        };
        let required = ColumnSet::new(mapped.columns.clone()).map_err(schema_error)?;
        let reconciled = schema::reconcile(&mut *self.gateway, table, current.as_ref(), &required)?;
        let layout = RowLayout::new(&mapped, &reconciled.columns).map_err(schema_error)?;

        let mut writer = BatchWriter::new(
            &mut *self.gateway,
            table,
            reconciled.columns.names(),
            file,
            options.batch_size,
            run_rows,
        );
        let mut ragged_rows = 0usize;
        for (idx, record) in records.enumerate() {
            let raw = record?;
            if layout.is_ragged(&raw) {
                if options.ragged_rows == RaggedRowPolicy::Strict {
                    return Err(Error::RaggedRow {
                        file: file.to_path_buf(),
                        row: idx + 1,
                        expected: layout.source_width(),
                        found: raw.len(),
                    });
                }
                ragged_rows += 1;
            }
            writer.push(layout.shape(raw))?;
            if writer.buffered() == 0 {
                check_cancelled(self.cancel.as_deref(), writer.run_rows())?;
            }
        }
        let rows = writer.finish()?;

        if ragged_rows > 0 {
            warn!(
                "{ragged_rows} row(s) of {:?} did not have {} cell(s) and were padded or truncated",
                file,
                layout.source_width()
            );
        }
        info!("Imported {rows} row(s) from {:?}", file);
        Ok((
            Some(reconciled.columns),
            FileReport {
                file: file.to_path_buf(),
                rows,
                ragged_rows,
                schema_change: reconciled.change,
                skipped: false,
            },
        ))
    }
}

fn check_cancelled(flag: Option<&AtomicBool>, rows_committed: usize) -> Result<()> {
    match flag {
        Some(flag) if flag.load(Ordering::SeqCst) => {
            warn!("Cancellation requested; stopping after {rows_committed} row(s)");
            Err(Error::Cancelled { rows_committed })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGateway;

    fn records(lines: &[&[&str]]) -> Vec<Result<Vec<String>>> {
        lines
            .iter()
            .map(|cells| Ok(cells.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn empty_file_list_is_nothing_to_do() {
        let mut gateway = MemoryGateway::new();
        let mapping = ColumnMapping::new();
        let options = IngestOptions::new("t");
        let outcome = Ingestor::new(&mut gateway, &mapping, &options)
            .ingest_files(&[])
            .unwrap();
        assert_eq!(outcome, IngestOutcome::NothingToDo);
        assert_eq!(outcome.total_rows(), 0);
    }

    #[test]
    fn headerless_file_is_skipped_without_schema_change() {
        let mut gateway = MemoryGateway::new();
        let mapping = ColumnMapping::new();
        let options = IngestOptions::new("t");
        let mut ingestor = Ingestor::new(&mut gateway, &mapping, &options);
        let (columns, report) = ingestor
            .ingest_records(Path::new("empty.csv"), None, Vec::new(), 0)
            .unwrap();
        assert!(columns.is_none());
        assert!(report.skipped);
        assert!(gateway.schema_changes().is_empty());
    }

    #[test]
    fn reordered_subset_lands_in_named_columns() {
        let mut gateway = MemoryGateway::new().with_table("t", &["a", "b", "c"]);
        let mapping = ColumnMapping::new();
        let options = IngestOptions::new("t");
        let current = gateway.columns_of("t").unwrap();
        let mut ingestor = Ingestor::new(&mut gateway, &mapping, &options);
        let (columns, report) = ingestor
            .ingest_records(
                Path::new("f.csv"),
                current,
                records(&[&["c", "a"], &["3", "1"]]),
                0,
            )
            .unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(columns.unwrap().names(), ["a", "b", "c"]);
        assert_eq!(gateway.table("t").unwrap().rows(), &[cells(&["1", "", "3"])]);
    }

    #[test]
    fn strict_policy_rejects_ragged_rows() {
        let mut gateway = MemoryGateway::new();
        let mapping = ColumnMapping::new();
        let options = IngestOptions::new("t").with_ragged_rows(RaggedRowPolicy::Strict);
        let mut ingestor = Ingestor::new(&mut gateway, &mapping, &options);
        let err = ingestor
            .ingest_records(
                Path::new("f.csv"),
                None,
                records(&[&["a", "b"], &["1", "2"], &["3"]]),
                0,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RaggedRow {
                row: 2,
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn lenient_policy_counts_ragged_rows() {
        let mut gateway = MemoryGateway::new();
        let mapping = ColumnMapping::new();
        let options = IngestOptions::new("t");
        let mut ingestor = Ingestor::new(&mut gateway, &mapping, &options);
        let (_, report) = ingestor
            .ingest_records(
                Path::new("f.csv"),
                None,
                records(&[&["a", "b"], &["1"], &["2", "3", "4"], &["5", "6"]]),
                0,
            )
            .unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.ragged_rows, 2);
    }

    #[test]
    fn duplicate_mapped_columns_are_a_schema_error() {
        let mut gateway = MemoryGateway::new();
        let mapping = ColumnMapping::parse("x > a").unwrap();
        let options = IngestOptions::new("t");
        let mut ingestor = Ingestor::new(&mut gateway, &mapping, &options);
        let err = ingestor
            .ingest_records(Path::new("f.csv"), None, records(&[&["a", "x"]]), 0)
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
        assert!(gateway.schema_changes().is_empty());
    }

    #[test]
    fn cancellation_stops_between_batches() {
        let mut gateway = MemoryGateway::new();
        let mapping = ColumnMapping::new();
        let options = IngestOptions::new("t").with_batch_size(2);
        let flag = Arc::new(AtomicBool::new(true));
        let mut ingestor =
            Ingestor::new(&mut gateway, &mapping, &options).with_cancel_flag(flag);
        let err = ingestor
            .ingest_records(
                Path::new("f.csv"),
                None,
                records(&[&["a"], &["1"], &["2"], &["3"]]),
                5,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { rows_committed: 7 }));
        assert_eq!(gateway.insert_batches(), &[2]);
    }
}
