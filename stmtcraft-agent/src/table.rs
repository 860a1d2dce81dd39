//! Typed in-memory tables.
//!
//! A `Table` is what both sides of the comparison reduce to: the sample CSV
//! loaded the way `pandas.read_csv` would type it, and the DataFrame returned
//! by a generated parser as reported by the execution harness.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use stmtcraft_error::{Error, Result};

/// Tokens `read_csv` treats as missing by default.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Column dtype, named after the pandas dtype it mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    Object,
    /// Any other dtype, kept by name (int32, float32, string, datetime64[ns], ...)
    Other(String),
}

impl ColumnType {
    /// Only the exact numpy names map to modelled types; `float32` or the
    /// nullable `Float64` stay distinct, as `DataFrame.equals` keeps them.
    pub fn from_dtype(dtype: &str) -> Self {
        match dtype {
            "int64" => ColumnType::Int64,
            "float64" => ColumnType::Float64,
            "bool" => ColumnType::Bool,
            "object" => ColumnType::Object,
            other => ColumnType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Bool => "bool",
            ColumnType::Object => "object",
            ColumnType::Other(name) => name,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single value.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

/// Strict equality: no int/float cross-equality and no tolerance.
/// A NaN float counts as missing, like pandas does.
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self.normalized(), other.normalized()) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a == b,
            (Cell::Bool(a), Cell::Bool(b)) => a == b,
            (Cell::Str(a), Cell::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Cell {
    fn normalized(&self) -> &Cell {
        match self {
            Cell::Float(f) if f.is_nan() => &Cell::Null,
            other => other,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NaN"),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{:?}", v),
            Cell::Bool(true) => write!(f, "True"),
            Cell::Bool(false) => write!(f, "False"),
            Cell::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Columns, dtypes and rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub dtypes: Vec<ColumnType>,
    pub rows: Vec<Vec<Cell>>,
    /// Rows are labelled 0..n (a fresh RangeIndex)
    pub default_index: bool,
}

impl Table {
    /// `(rows, columns)`, printed like a DataFrame shape
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn schema(&self) -> impl Iterator<Item = (&str, &ColumnType)> {
        self.columns.iter().map(String::as_str).zip(self.dtypes.iter())
    }

    /// Load a CSV file with `read_csv` default typing.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| {
                Error::sample_invalid(format!("cannot open {}: {}", path.display(), e))
                    .with_operation("table::from_csv_path")
                    .with_context("path", path.display().to_string())
            })?;
        Self::from_csv_reader(reader).map_err(|e| {
            e.with_operation("table::from_csv_path")
                .with_context("path", path.display().to_string())
        })
    }

    /// Load CSV text; used for fixtures and prompts.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());
        Self::from_csv_reader(reader)
    }

    fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| Error::sample_invalid(format!("cannot read CSV header: {}", e)))?
            .iter()
            .map(|s| s.to_string())
            .collect();

        if header.is_empty() || header.iter().all(|c| c.is_empty()) {
            return Err(Error::sample_invalid("CSV has no header row"));
        }
        let columns = normalize_headers(header);

        let mut raw: Vec<Vec<String>> = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                Error::sample_invalid(format!("malformed CSV record {}: {}", idx + 2, e))
                    .with_context("line", (idx + 2).to_string())
            })?;
            raw.push(record.iter().map(|s| s.to_string()).collect());
        }

        let inferred: Vec<Inferred> = (0..columns.len())
            .map(|col| infer_column(raw.iter().map(|row| row[col].as_str())))
            .collect();

        let rows = raw
            .iter()
            .map(|row| {
                row.iter()
                    .zip(inferred.iter())
                    .map(|(value, column)| convert(value, column))
                    .collect()
            })
            .collect();
        let dtypes = inferred.into_iter().map(|column| column.dtype).collect();

        Ok(Table {
            columns,
            dtypes,
            rows,
            default_index: true,
        })
    }

    /// Render the first `limit` rows as CSV text for prompting.
    pub fn preview_csv(&self, limit: usize) -> String {
        let mut out = self.columns.join(",");
        out.push('\n');
        for row in self.rows.iter().take(limit) {
            let line: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    Cell::Null => String::new(),
                    Cell::Str(s) if s.contains(',') || s.contains('"') => {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    }
                    Cell::Str(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }
}

/// Blank names become `Unnamed: {i}` and repeats get `.1`, `.2`, ... suffixes,
/// the way `read_csv` names its columns.
fn normalize_headers(header: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());
    for (idx, name) in header.into_iter().enumerate() {
        let mut name = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };
        let mut seen = counts.get(&name).copied().unwrap_or(0);
        while seen > 0 {
            counts.insert(name.clone(), seen + 1);
            name = format!("{}.{}", name, seen);
            seen = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), seen + 1);
        names.push(name);
    }
    names
}

fn is_na(value: &str) -> bool {
    NA_VALUES.contains(&value)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

fn parse_float(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Rust accepts "infinity" and "nan" spellings pandas does not treat as numbers
    let lower = trimmed.to_ascii_lowercase();
    if lower.contains("nan") || lower == "infinity" || lower == "+infinity" || lower == "-infinity" {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

struct Inferred {
    dtype: ColumnType,
    /// Every present value is a True/False token
    bool_values: bool,
}

fn infer_column<'a>(values: impl Iterator<Item = &'a str>) -> Inferred {
    let mut saw_null = false;
    let mut saw_value = false;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;

    for value in values {
        if is_na(value) {
            saw_null = true;
            continue;
        }
        saw_value = true;
        if all_int && value.trim().parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && parse_float(value).is_none() {
            all_float = false;
        }
        if all_bool && parse_bool(value).is_none() {
            all_bool = false;
        }
    }

    let dtype = match (saw_value, saw_null) {
        (false, false) => ColumnType::Object,
        (false, true) => ColumnType::Float64,
        (true, false) if all_int => ColumnType::Int64,
        (true, true) if all_int => ColumnType::Float64,
        _ if all_float => ColumnType::Float64,
        (true, false) if all_bool => ColumnType::Bool,
        _ => ColumnType::Object,
    };
    Inferred {
        dtype,
        bool_values: saw_value && all_bool,
    }
}

fn convert(value: &str, column: &Inferred) -> Cell {
    if is_na(value) {
        return Cell::Null;
    }
    match &column.dtype {
        ColumnType::Int64 => value.trim().parse().map(Cell::Int).unwrap_or(Cell::Null),
        ColumnType::Float64 => parse_float(value).map(Cell::Float).unwrap_or(Cell::Null),
        ColumnType::Bool => parse_bool(value).map(Cell::Bool).unwrap_or(Cell::Null),
        // bool-with-missing columns keep their booleans as objects
        ColumnType::Object if column.bool_values => parse_bool(value)
            .map(Cell::Bool)
            .unwrap_or_else(|| Cell::Str(value.to_string())),
        ColumnType::Object => Cell::Str(value.to_string()),
        ColumnType::Other(_) => Cell::Str(value.to_string()),
    }
}

// ============================================================================
// Harness payload
// ============================================================================

/// The JSON document the execution harness prints for a DataFrame.
#[derive(Debug, Deserialize)]
pub struct FramePayload {
    pub columns: Vec<String>,
    pub dtypes: Vec<String>,
    #[serde(default = "default_true")]
    pub default_index: bool,
    pub data: Vec<Vec<serde_json::Value>>,
}

fn default_true() -> bool {
    true
}

impl FramePayload {
    pub fn into_table(self) -> Result<Table> {
        if self.columns.len() != self.dtypes.len() {
            return Err(Error::execution_failed(format!(
                "harness reported {} columns but {} dtypes",
                self.columns.len(),
                self.dtypes.len()
            )));
        }

        let dtypes: Vec<ColumnType> = self.dtypes.iter().map(|d| ColumnType::from_dtype(d)).collect();
        let mut rows = Vec::with_capacity(self.data.len());
        for (idx, row) in self.data.into_iter().enumerate() {
            if row.len() != dtypes.len() {
                return Err(Error::execution_failed(format!(
                    "row {} has {} values, expected {}",
                    idx,
                    row.len(),
                    dtypes.len()
                )));
            }
            rows.push(
                row.into_iter()
                    .zip(dtypes.iter())
                    .map(|(value, dtype)| cell_from_json(value, dtype))
                    .collect(),
            );
        }

        Ok(Table {
            columns: self.columns,
            dtypes,
            rows,
            default_index: self.default_index,
        })
    }
}

fn cell_from_json(value: serde_json::Value, dtype: &ColumnType) -> Cell {
    use serde_json::Value;
    match (value, dtype) {
        (Value::Null, _) => Cell::Null,
        (Value::Number(n), ColumnType::Float64) => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
        (Value::Number(n), _) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
        },
        (Value::Bool(b), _) => Cell::Bool(b),
        (Value::String(s), _) => Cell::Str(s),
        (other, _) => Cell::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICICI: &str = "Date,Description,Amount\n\
                         01-08-2024,Salary Credit,50000.0\n\
                         02-08-2024,ATM Withdrawal,-2000.5\n\
                         03-08-2024,UPI Payment,-150.25\n";

    #[test]
    fn test_infers_pandas_dtypes() {
        let table = Table::from_csv_str(ICICI).unwrap();
        assert_eq!(table.columns, vec!["Date", "Description", "Amount"]);
        assert_eq!(
            table.dtypes,
            vec![ColumnType::Object, ColumnType::Object, ColumnType::Float64]
        );
        assert_eq!(table.shape(), (3, 3));
        assert_eq!(table.rows[1][2], Cell::Float(-2000.5));
        assert!(table.default_index);
    }

    #[test]
    fn test_int_column_with_missing_becomes_float() {
        let table = Table::from_csv_str("a,b,c\n1,2,x\n,3,\n").unwrap();
        assert_eq!(table.dtypes[0], ColumnType::Float64);
        assert_eq!(table.dtypes[1], ColumnType::Int64);
        assert_eq!(table.dtypes[2], ColumnType::Object);
        assert_eq!(table.rows[0][0], Cell::Float(1.0));
        assert!(table.rows[1][0].is_null());
        assert!(table.rows[1][2].is_null());
    }

    #[test]
    fn test_all_missing_column_is_float() {
        let table = Table::from_csv_str("a,b\n,1\nNaN,2\n").unwrap();
        assert_eq!(table.dtypes[0], ColumnType::Float64);
        assert!(table.rows.iter().all(|r| r[0].is_null()));
    }

    #[test]
    fn test_bool_columns() {
        let table = Table::from_csv_str("flag,maybe\nTrue,true\nFALSE,\n").unwrap();
        assert_eq!(table.dtypes[0], ColumnType::Bool);
        assert_eq!(table.dtypes[1], ColumnType::Object);
        assert_eq!(table.rows[0][1], Cell::Bool(true));
    }

    #[test]
    fn test_mixed_bool_tokens_stay_strings() {
        let table = Table::from_csv_str("Flag\nTrue\nfoo\n").unwrap();
        assert_eq!(table.dtypes[0], ColumnType::Object);
        assert_eq!(table.rows[0][0], Cell::Str("True".into()));
        assert_eq!(table.rows[1][0], Cell::Str("foo".into()));
    }

    #[test]
    fn test_headers_named_like_read_csv() {
        let table = Table::from_csv_str(",Date\n0,x\n").unwrap();
        assert_eq!(table.columns, vec!["Unnamed: 0", "Date"]);

        let table = Table::from_csv_str("A,A,A.1,A\n1,2,3,4\n").unwrap();
        assert_eq!(table.columns, vec!["A", "A.1", "A.1.1", "A.2"]);
    }

    #[test]
    fn test_only_exact_numpy_dtypes_are_modelled() {
        assert_eq!(ColumnType::from_dtype("float64"), ColumnType::Float64);
        for name in ["float32", "Float64", "int32", "Int64", "boolean", "string", "str"] {
            assert_eq!(ColumnType::from_dtype(name), ColumnType::Other(name.to_string()));
        }
    }

    #[test]
    fn test_empty_body_keeps_header() {
        let table = Table::from_csv_str("Date,Description,Amount\n").unwrap();
        assert_eq!(table.shape(), (0, 3));
        assert!(table.dtypes.iter().all(|d| *d == ColumnType::Object));
    }

    #[test]
    fn test_no_header_is_invalid() {
        let err = Table::from_csv_str("").unwrap_err();
        assert_eq!(err.kind(), stmtcraft_error::ErrorKind::SampleInvalid);
    }

    #[test]
    fn test_cell_equality_is_strict() {
        assert_ne!(Cell::Int(1), Cell::Float(1.0));
        assert_ne!(Cell::Str("1".into()), Cell::Int(1));
        assert_eq!(Cell::Null, Cell::Float(f64::NAN));
        assert_ne!(Cell::Float(0.1 + 0.2), Cell::Float(0.3));
    }

    #[test]
    fn test_payload_into_table() {
        let payload: FramePayload = serde_json::from_str(
            r#"{"columns": ["Date", "Description", "Amount"],
                "dtypes": ["object", "object", "float64"],
                "default_index": true,
                "data": [["01-08-2024", "Salary Credit", 50000],
                         ["02-08-2024", "ATM Withdrawal", -2000.5],
                         ["03-08-2024", "UPI Payment", -150.25]]}"#,
        )
        .unwrap();
        let produced = payload.into_table().unwrap();
        let expected = Table::from_csv_str(ICICI).unwrap();
        assert_eq!(produced, expected);
    }

    #[test]
    fn test_payload_ragged_rows_rejected() {
        let payload: FramePayload = serde_json::from_str(
            r#"{"columns": ["a"], "dtypes": ["int64"], "data": [[1, 2]]}"#,
        )
        .unwrap();
        assert!(payload.into_table().is_err());
    }

    #[test]
    fn test_preview_quotes_commas() {
        let table = Table::from_csv_str("Description,Amount\n\"NEFT, ref 12\",10\n").unwrap();
        let preview = table.preview_csv(5);
        assert_eq!(preview, "Description,Amount\n\"NEFT, ref 12\",10\n");
    }
}
