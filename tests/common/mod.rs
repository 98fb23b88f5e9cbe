#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory holding a settings file, a `csv/` input directory and
/// the SQLite database; cleaned up on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory with an empty `csv/` directory.
    pub fn new() -> Self {
        let temp_dir = tempdir().expect("temp dir");
        fs::create_dir(temp_dir.path().join("csv")).expect("create csv dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.path().join("csv")
    }

    pub fn database(&self) -> PathBuf {
        self.path().join("out.db")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes an input file into the `csv/` directory.
    pub fn write_csv(&self, name: &str, contents: &str) -> PathBuf {
        self.write(&format!("csv/{name}"), contents)
    }

    /// Writes `settings.yml` pointing at this workspace, with `extra` YAML
    /// lines appended, and returns its path.
    pub fn write_settings(&self, table: &str, extra: &str) -> PathBuf {
        self.write(
            "settings.yml",
            &format!("database: out.db\ntable_name: {table}\ncsv_directory: csv\n{extra}"),
        )
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn cells(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|v| Some(v.to_string())).collect()
}
