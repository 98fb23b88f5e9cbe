//! Bounded write batches.
//!
//! A [`BatchWriter`] buffers normalized rows for one file and flushes them as
//! a single multi-row insert whenever the buffer fills, plus once more at end
//! of file. A flushed batch is never retried or re-buffered; a failed flush
//! reports the file and the 1-based data-row range that was in flight.

use std::path::Path;

use log::debug;

use crate::{
    error::{Error, Result},
    storage::StorageGateway,
};

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Upper bound on rows reserved up front; larger batches grow on demand.
const MAX_PREALLOCATED_ROWS: usize = 1024;

pub struct BatchWriter<'a, G: StorageGateway + ?Sized> {
    gateway: &'a mut G,
    table: &'a str,
    columns: &'a [String],
    file: &'a Path,
    capacity: usize,
    buffer: Vec<Vec<String>>,
    file_rows: usize,
    run_rows: usize,
    flushes: usize,
}

impl<'a, G: StorageGateway + ?Sized> BatchWriter<'a, G> {
    /// `run_rows` is the number of rows already committed earlier in the run.
    pub fn new(
        gateway: &'a mut G,
        table: &'a str,
        columns: &'a [String],
        file: &'a Path,
        capacity: usize,
        run_rows: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            gateway,
            table,
            columns,
            file,
            capacity,
            buffer: Vec::with_capacity(capacity.min(MAX_PREALLOCATED_ROWS)),
            file_rows: 0,
            run_rows,
            flushes: 0,
        }
    }

    pub fn push(&mut self, row: Vec<String>) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the buffered rows, if any, and returns how many were written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let count = self.buffer.len();
        let first_row = self.file_rows + 1;
        let last_row = self.file_rows + count;
        self.gateway
            .insert_rows(self.table, self.columns, &self.buffer)
            .map_err(|source| Error::Ingest {
                file: self.file.to_path_buf(),
                first_row,
                last_row,
                source,
            })?;
        debug!(
            "Flushed rows {first_row}-{last_row} of {:?} into '{}'",
            self.file, self.table
        );
        self.buffer.clear();
        self.file_rows += count;
        self.run_rows += count;
        self.flushes += 1;
        Ok(count)
    }

    /// Flushes the remainder and returns the rows written for this file.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.file_rows)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn file_rows(&self) -> usize {
        self.file_rows
    }

    pub fn run_rows(&self) -> usize {
        self.run_rows
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}
