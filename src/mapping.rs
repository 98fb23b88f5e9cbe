//! Column renaming and dropping.
//!
//! A mapping table is a line-oriented text file where each entry reads
//! `source > target`. A target of `*` drops the source column from ingestion.
//! Blank lines and lines starting with `#` are ignored.
//!
//! [`ColumnMapping::apply`] projects a file's header through the table and
//! reports which source positions every data row of that file must discard.

use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::Path,
};

use log::debug;

use crate::error::{Error, Result};

pub const DROP_MARKER: &str = "*";
const SEPARATOR: char = '>';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnTarget {
    Keep(String),
    Drop,
}

impl ColumnTarget {
    fn parse(raw: &str) -> Self {
        if raw == DROP_MARKER {
            ColumnTarget::Drop
        } else {
            ColumnTarget::Keep(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    entries: Vec<(String, ColumnTarget)>,
    lookup: HashMap<String, usize>,
}

/// A file header after the mapping table has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedHeader {
    pub columns: Vec<String>,
    pub excluded: BTreeSet<usize>,
}

impl MappedHeader {
    pub fn source_width(&self) -> usize {
        self.columns.len() + self.excluded.len()
    }
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut mapping = Self::new();
        for (idx, line) in contents.lines().enumerate() {
            let line_number = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (source, target) = trimmed.split_once(SEPARATOR).ok_or_else(|| {
                Error::configuration(format!(
                    "Mapping line {line_number} is missing the '{SEPARATOR}' separator: '{trimmed}'"
                ))
            })?;
            let source = source.trim();
            let target = target.trim();
            if source.is_empty() {
                return Err(Error::configuration(format!(
                    "Mapping line {line_number} has an empty source column"
                )));
            }
            if target.is_empty() {
                return Err(Error::configuration(format!(
                    "Mapping line {line_number} has an empty target for '{source}' (use '{DROP_MARKER}' to drop it)"
                )));
            }
            if !mapping.insert(source, ColumnTarget::parse(target)) {
                return Err(Error::configuration(format!(
                    "Mapping line {line_number} maps '{source}' more than once"
                )));
            }
        }
        Ok(mapping)
    }

    /// Loads a mapping table from disk. A missing file is an error; callers
    /// that treat the file as optional check for it first.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            Error::configuration(format!("Reading mapping file {path:?}: {err}"))
        })?;
        let mapping = Self::parse(&contents)?;
        debug!("Loaded {} column mapping(s) from {:?}", mapping.len(), path);
        Ok(mapping)
    }

    fn insert(&mut self, source: &str, target: ColumnTarget) -> bool {
        if self.lookup.contains_key(source) {
            return false;
        }
        self.lookup.insert(source.to_string(), self.entries.len());
        self.entries.push((source.to_string(), target));
        true
    }

    pub fn with_entry(mut self, source: &str, target: ColumnTarget) -> Result<Self> {
        if !self.insert(source, target) {
            return Err(Error::configuration(format!(
                "Column '{source}' is already mapped"
            )));
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ColumnTarget)> {
        self.entries
            .iter()
            .map(|(source, target)| (source.as_str(), target))
    }

    pub fn target(&self, source: &str) -> Option<&ColumnTarget> {
        self.lookup.get(source).map(|idx| &self.entries[*idx].1)
    }

    pub fn apply(&self, header: &[String]) -> MappedHeader {
        let mut columns = Vec::with_capacity(header.len());
        let mut excluded = BTreeSet::new();
        for (idx, name) in header.iter().enumerate() {
            match self.target(name) {
                None => columns.push(name.clone()),
                Some(ColumnTarget::Keep(renamed)) => columns.push(renamed.clone()),
                Some(ColumnTarget::Drop) => {
                    excluded.insert(idx);
                }
            }
        }
        MappedHeader { columns, excluded }
    }
}
