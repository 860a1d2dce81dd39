//! Running generated parsers.
//!
//! A parser is an opaque Python module. `PythonRuntime` imports it in a fresh
//! interpreter through a small harness, calls `parse(pdf_path)` and reads the
//! resulting DataFrame back as JSON. Nothing survives between invocations.

use crate::table::{FramePayload, Table};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use stmtcraft_error::{Error, Result};
use tokio::process::Command;
use tracing::{debug, warn};

/// Harness exit code for a module that breaks the `parse` contract
const CONTRACT_EXIT: i32 = 3;

/// Harness exit code when the interpreter cannot import pandas
const MISSING_PANDAS_EXIT: i32 = 4;

/// Longest stderr excerpt kept in an error (the tail is kept)
const MAX_STDERR_CHARS: usize = 8000;

const HARNESS: &str = r#"
import importlib.util
import json
import math
import sys


def cell(value):
    if value is None:
        return None
    if hasattr(value, "item") and not isinstance(value, (str, bytes)):
        try:
            value = value.item()
        except (TypeError, ValueError):
            pass
    if isinstance(value, float):
        if math.isnan(value):
            return None
        if math.isinf(value):
            return str(value)
        return value
    if isinstance(value, (bool, int, str)):
        return value
    try:
        import pandas as pd
        if pd.isna(value):
            return None
    except (TypeError, ValueError):
        pass
    return str(value)


def main(parser_path, pdf_path):
    try:
        import pandas as pd
    except ImportError as exc:
        print("cannot import pandas: %s" % exc, file=sys.stderr)
        return 4

    real_stdout = sys.stdout
    sys.stdout = sys.stderr
    try:
        module_spec = importlib.util.spec_from_file_location("generated_parser", parser_path)
        module = importlib.util.module_from_spec(module_spec)
        module_spec.loader.exec_module(module)
        parse = getattr(module, "parse", None)
        if not callable(parse):
            print("parser module does not define a callable parse(pdf_path)", file=sys.stderr)
            return 3
        df = parse(pdf_path)
        if not isinstance(df, pd.DataFrame):
            print("parse() returned %s, expected pandas.DataFrame" % type(df).__name__, file=sys.stderr)
            return 3
    finally:
        sys.stdout = real_stdout

    payload = {
        "columns": [str(c) for c in df.columns],
        "dtypes": [str(t) for t in df.dtypes],
        "default_index": bool(df.index.equals(pd.RangeIndex(len(df)))),
        "data": [[cell(v) for v in row] for row in df.itertuples(index=False, name=None)],
    }
    json.dump(payload, sys.stdout)
    return 0


sys.exit(main(sys.argv[1], sys.argv[2]))
"#;

/// Executes a parser file against a PDF and returns its table.
#[allow(async_fn_in_trait)]
pub trait ParserRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Confirm the runtime can run parsers at all.
    async fn check(&self) -> Result<()> {
        Ok(())
    }

    async fn invoke(&self, parser: &Path, pdf: &Path) -> Result<Table>;

    /// Run the project's test suite in `dir`, if this runtime has one.
    /// Returns the suite's exit code.
    async fn run_test_suite(&self, _dir: &Path) -> Result<Option<i32>> {
        Ok(None)
    }
}

/// Runs parsers with an external Python interpreter.
pub struct PythonRuntime {
    python: String,
    timeout: Duration,
}

impl PythonRuntime {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
        }
    }

    pub fn python(&self) -> &str {
        &self.python
    }

    async fn spawn(&self, parser: &Path, pdf: &Path) -> Result<std::process::Output> {
        let child = Command::new(&self.python)
            .arg("-c")
            .arg(HARNESS)
            .arg(parser)
            .arg(pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::execution_failed(format!("failed to start '{}': {}", self.python, e))
                    .with_operation("python_runtime::spawn")
                    .set_source(e)
            })?;

        child.wait_with_output().await.map_err(|e| {
            Error::execution_failed(format!("failed to wait for parser: {}", e))
                .with_operation("python_runtime::spawn")
                .set_source(e)
        })
    }
}

impl ParserRuntime for PythonRuntime {
    fn name(&self) -> &str {
        "python"
    }

    /// `<python> -c "import pandas"`
    async fn check(&self) -> Result<()> {
        let output = Command::new(&self.python)
            .args(["-c", "import pandas"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::config_invalid(format!("failed to start '{}': {}", self.python, e))
                    .with_operation("python_runtime::check")
                    .set_source(e)
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(missing_pandas(&self.python, stderr.trim()).with_operation("python_runtime::check"))
    }

    async fn invoke(&self, parser: &Path, pdf: &Path) -> Result<Table> {
        let start = Instant::now();
        debug!(parser = %parser.display(), pdf = %pdf.display(), "running parser");

        // dropping the future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, self.spawn(parser, pdf)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "parser timed out");
                return Err(Error::execution_timeout(self.timeout.as_secs())
                    .with_operation("python_runtime::invoke")
                    .with_context("parser", parser.display().to_string()));
            }
        };

        debug!(elapsed_ms = start.elapsed().as_millis() as u64, status = ?output.status, "parser finished");

        let stderr = tail(&String::from_utf8_lossy(&output.stderr), MAX_STDERR_CHARS);
        match output.status.code() {
            Some(0) => {}
            Some(MISSING_PANDAS_EXIT) => {
                return Err(missing_pandas(&self.python, stderr.trim())
                    .with_operation("python_runtime::invoke"));
            }
            Some(CONTRACT_EXIT) => {
                return Err(Error::contract_violation(stderr.trim().to_string())
                    .with_operation("python_runtime::invoke")
                    .with_context("parser", parser.display().to_string()));
            }
            code => {
                let message = if stderr.trim().is_empty() {
                    format!("parser exited with status {:?}", code)
                } else {
                    format!("Exception while running parse():\n{}", stderr.trim())
                };
                return Err(Error::execution_failed(message)
                    .with_operation("python_runtime::invoke")
                    .with_context("exit_code", format!("{:?}", code)));
            }
        }

        let payload: FramePayload = serde_json::from_slice(&output.stdout).map_err(|e| {
            Error::execution_failed(format!("harness printed malformed output: {}", e))
                .with_operation("python_runtime::invoke")
                .set_source(e)
        })?;
        payload
            .into_table()
            .map_err(|e| e.with_operation("python_runtime::invoke"))
    }

    /// `<python> -m pytest -q`
    async fn run_test_suite(&self, dir: &Path) -> Result<Option<i32>> {
        let status = Command::new(&self.python)
            .args(["-m", "pytest", "-q"])
            .current_dir(dir)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                Error::execution_failed(format!("failed to start {} -m pytest: {}", self.python, e))
                    .with_operation("python_runtime::run_test_suite")
                    .set_source(e)
            })?;
        Ok(Some(status.code().unwrap_or(-1)))
    }
}

fn missing_pandas(python: &str, detail: &str) -> Error {
    Error::config_invalid(format!(
        "'{}' cannot import pandas; install it or point STMTCRAFT_PYTHON at another interpreter",
        python
    ))
    .with_context("detail", detail.to_string())
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let skipped: String = text.chars().skip(count - max_chars).collect();
    format!("...\n{}", skipped)
}
