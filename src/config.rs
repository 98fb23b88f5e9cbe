//! Settings file loading.
//!
//! Settings are a YAML document read once at start-up into an immutable
//! [`Settings`] value. Relative paths resolve against the directory holding the
//! settings file, so a settings file, its mapping table and its CSV directory
//! can travel together.

use std::{
    fs,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use log::debug;
use serde::Deserialize;

use crate::{
    batch::DEFAULT_BATCH_SIZE,
    cli::parse_delimiter,
    error::{Error, Result},
    ingest::IngestOptions,
    io_utils,
    mapping::ColumnMapping,
    rows::RaggedRowPolicy,
};

pub const DEFAULT_MAPPING_FILE: &str = "mapcolumns.txt";
const DEFAULT_FILE_EXTENSION: &str = "csv";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    database: PathBuf,
    table_name: String,
    csv_directory: PathBuf,
    #[serde(default)]
    mapping_file: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    ragged_rows: RaggedRowPolicy,
    #[serde(default)]
    delimiter: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default = "default_file_extension")]
    file_extension: String,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_file_extension() -> String {
    DEFAULT_FILE_EXTENSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    /// Configured explicitly; must exist.
    Required(PathBuf),
    /// The conventional file next to the settings; used only if present.
    Optional(PathBuf),
}

impl MappingSource {
    pub fn path(&self) -> &Path {
        match self {
            MappingSource::Required(path) | MappingSource::Optional(path) => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub table_name: String,
    pub csv_directory: PathBuf,
    pub mapping: MappingSource,
    pub batch_size: usize,
    pub ragged_rows: RaggedRowPolicy,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub file_extension: String,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            Error::configuration(format!("Reading settings file {path:?}: {err}"))
        })?;
        let base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let settings = Self::from_yaml_str(&contents, base_dir)?;
        debug!("Loaded settings from {:?}: {:?}", path, settings);
        Ok(settings)
    }

    pub fn from_yaml_str(contents: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawSettings = serde_yaml::from_str(contents)
            .map_err(|err| Error::configuration(format!("Parsing settings: {err}")))?;

        let table_name = raw.table_name.trim().to_string();
        if table_name.is_empty() {
            return Err(Error::configuration("table_name must not be empty"));
        }
        if raw.batch_size == 0 {
            return Err(Error::configuration("batch_size must be greater than zero"));
        }
        let delimiter = raw
            .delimiter
            .as_deref()
            .map(parse_delimiter)
            .transpose()
            .map_err(|err| Error::configuration(format!("Invalid delimiter: {err}")))?;
        let encoding = io_utils::resolve_encoding(raw.encoding.as_deref())?;
        let mapping = match raw.mapping_file {
            Some(path) => MappingSource::Required(resolve(base_dir, path)),
            None => MappingSource::Optional(base_dir.join(DEFAULT_MAPPING_FILE)),
        };
        let file_extension = raw.file_extension.trim_start_matches('.').to_string();

        Ok(Self {
            database: resolve(base_dir, raw.database),
            table_name,
            csv_directory: resolve(base_dir, raw.csv_directory),
            mapping,
            batch_size: raw.batch_size,
            ragged_rows: raw.ragged_rows,
            delimiter,
            encoding,
            file_extension,
        })
    }

    pub fn load_mapping(&self) -> Result<ColumnMapping> {
        match &self.mapping {
            MappingSource::Required(path) => ColumnMapping::load(path),
            MappingSource::Optional(path) if path.is_file() => ColumnMapping::load(path),
            MappingSource::Optional(path) => {
                debug!("No mapping file at {:?}; columns pass through unchanged", path);
                Ok(ColumnMapping::new())
            }
        }
    }

    pub fn input_files(&self) -> Result<Vec<PathBuf>> {
        io_utils::list_input_files(&self.csv_directory, &self.file_extension)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            table: self.table_name.clone(),
            batch_size: self.batch_size,
            ragged_rows: self.ragged_rows,
            delimiter: self.delimiter,
            encoding: self.encoding,
        }
    }
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
