//! Persists generated parser source.

use crate::sample::Target;
use std::fs;
use std::path::{Path, PathBuf};
use stmtcraft_error::{Error, Result};
use tracing::info;

/// Writes `<dir>/<target>_parser.py`, one file per target.
pub struct ParserWriter {
    dir: PathBuf,
}

impl ParserWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the parser for `target` lives
    pub fn path_for(&self, target: &Target) -> PathBuf {
        self.dir.join(target.parser_file_name())
    }

    /// Overwrite the target's parser with `source`.
    pub fn write(&self, target: &Target, source: &str) -> Result<PathBuf> {
        self.ensure_package()?;

        let path = self.path_for(target);
        let mut body = source.trim().to_string();
        body.push('\n');

        fs::write(&path, body).map_err(|e| {
            Error::write_failed(path.display().to_string(), e.to_string())
                .with_operation("writer::write")
                .set_source(e)
        })?;

        info!(path = %path.display(), "saved parser");
        Ok(path)
    }

    /// Create the directory and its `__init__.py` marker if missing.
    fn ensure_package(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::write_failed(self.dir.display().to_string(), e.to_string())
                .with_operation("writer::ensure_package")
                .set_source(e)
        })?;

        let init = self.dir.join("__init__.py");
        if !init.exists() {
            fs::write(&init, "").map_err(|e| {
                Error::write_failed(init.display().to_string(), e.to_string())
                    .with_operation("writer::ensure_package")
                    .set_source(e)
            })?;
        }
        Ok(())
    }
}
