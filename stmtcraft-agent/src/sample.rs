//! Target names and their sample statement files.

use crate::table::{ColumnType, Table};
use std::fs;
use std::path::{Path, PathBuf};
use stmtcraft_error::{Error, Result};
use tracing::debug;

/// A bank whose statement format we are learning to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
}

impl Target {
    /// Normalize (trim, lowercase) and validate a bank name.
    ///
    /// The name becomes part of file paths, so only `[a-z0-9_-]` is allowed.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::invalid_argument("target name is empty")
                .with_operation("target::parse"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(Error::invalid_argument(format!(
                "target '{}' may only contain a-z, 0-9, '_' and '-'",
                raw.trim()
            ))
            .with_operation("target::parse")
            .with_context("target", raw.trim().to_string()));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module file name of the generated parser
    pub fn parser_file_name(&self) -> String {
        format!("{}_parser.py", self.name)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Sample PDF and its reference CSV
#[derive(Debug, Clone)]
pub struct SampleFiles {
    pub pdf: PathBuf,
    pub csv: PathBuf,
}

impl SampleFiles {
    /// Find the sample pair under `<data_dir>/<target>/`.
    ///
    /// `<target>_sample.pdf` / `.csv` win; otherwise the first file with the
    /// right extension in name order.
    pub fn locate(data_dir: &Path, target: &Target) -> Result<Self> {
        let dir = data_dir.join(target.name());
        if !dir.is_dir() {
            return Err(Error::missing_sample(
                target.name(),
                format!("sample directory {} does not exist", dir.display()),
            )
            .with_operation("sample::locate"));
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| Error::from(e).with_operation("sample::locate"))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let pdf = pick(&entries, target, "pdf").ok_or_else(|| {
            Error::missing_sample(target.name(), format!("no PDF found in {}", dir.display()))
                .with_operation("sample::locate")
        })?;
        let csv = pick(&entries, target, "csv").ok_or_else(|| {
            Error::missing_sample(target.name(), format!("no CSV found in {}", dir.display()))
                .with_operation("sample::locate")
        })?;

        debug!(pdf = %pdf.display(), csv = %csv.display(), "located samples");
        Ok(Self { pdf, csv })
    }
}

fn pick(entries: &[PathBuf], target: &Target, ext: &str) -> Option<PathBuf> {
    let preferred = format!("{}_sample.{}", target.name(), ext);
    let matches_ext = |p: &&PathBuf| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    };

    entries
        .iter()
        .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(preferred.as_str()))
        .or_else(|| entries.iter().find(matches_ext))
        .cloned()
}

/// The table every generated parser must reproduce.
#[derive(Debug, Clone)]
pub struct ExpectedSchema {
    pub table: Table,
}

impl ExpectedSchema {
    pub fn columns(&self) -> &[String] {
        &self.table.columns
    }

    pub fn dtypes(&self) -> impl Iterator<Item = (&str, &ColumnType)> {
        self.table.schema()
    }
}

/// Everything read from disk before the first attempt.
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub target: Target,
    pub files: SampleFiles,
    pub schema: ExpectedSchema,
}

impl SampleSet {
    pub fn pdf_name(&self) -> String {
        self.files
            .pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Loads the sample pair for a target.
pub struct SchemaReader {
    data_dir: PathBuf,
}

impl SchemaReader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn read(&self, target: &Target) -> Result<SampleSet> {
        let files = SampleFiles::locate(&self.data_dir, target)?;
        let table = Table::from_csv_path(&files.csv)
            .map_err(|e| e.with_operation("schema_reader::read").with_context("target", target.name()))?;

        debug!(
            target = %target,
            rows = table.rows.len(),
            columns = table.columns.len(),
            "loaded expected table"
        );

        Ok(SampleSet {
            target: target.clone(),
            files,
            schema: ExpectedSchema { table },
        })
    }
}
