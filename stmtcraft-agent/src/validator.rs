//! Strict table comparison

use crate::table::Table;

/// Outcome of comparing a produced table with the expected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Compare `got` against `expected` the way `DataFrame.equals` does:
/// names, order, dtypes, shape, index and every cell, with no tolerance.
pub fn compare(expected: &Table, got: &Table) -> Verdict {
    match first_difference(expected, got) {
        None => Verdict::Pass,
        Some(detail) => Verdict::Fail(format!(
            "Mismatch in DataFrames: expected {:?}, got {:?}\n{}",
            expected.shape(),
            got.shape(),
            detail
        )),
    }
}

fn first_difference(expected: &Table, got: &Table) -> Option<String> {
    if expected.columns != got.columns {
        return Some(format!(
            "columns differ: expected {:?}, got {:?}",
            expected.columns, got.columns
        ));
    }

    for (idx, (want, have)) in expected.dtypes.iter().zip(got.dtypes.iter()).enumerate() {
        if want != have {
            return Some(format!(
                "dtype of column '{}' differs: expected {}, got {}",
                expected.columns[idx], want, have
            ));
        }
    }

    if expected.rows.len() != got.rows.len() {
        return Some(format!(
            "row count differs: expected {}, got {}",
            expected.rows.len(),
            got.rows.len()
        ));
    }

    if !got.default_index {
        return Some("index differs: expected a default RangeIndex (call reset_index(drop=True))".to_string());
    }

    for (row, (want_row, have_row)) in expected.rows.iter().zip(got.rows.iter()).enumerate() {
        for (col, (want, have)) in want_row.iter().zip(have_row.iter()).enumerate() {
            if want != have {
                return Some(format!(
                    "value differs at row {}, column '{}': expected {}, got {}",
                    row, expected.columns[col], want, have
                ));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, ColumnType, FramePayload};

    fn expected() -> Table {
        Table::from_csv_str(
            "Date,Description,Amount\n\
             01-08-2024,Salary Credit,50000.0\n\
             02-08-2024,ATM Withdrawal,-2000.5\n\
             03-08-2024,UPI Payment,-150.25\n",
        )
        .unwrap()
    }

    #[test]
    fn test_identical_tables_pass() {
        assert_eq!(compare(&expected(), &expected()), Verdict::Pass);
    }

    #[test]
    fn test_shape_mismatch_header() {
        let mut got = expected();
        got.rows.pop();
        let Verdict::Fail(diff) = compare(&expected(), &got) else { panic!("expected failure") };
        assert!(diff.starts_with("Mismatch in DataFrames: expected (3, 3), got (2, 3)"));
        assert!(diff.contains("row count differs"));
    }

    #[test]
    fn test_column_order_matters() {
        let mut got = expected();
        got.columns.swap(0, 1);
        let Verdict::Fail(diff) = compare(&expected(), &got) else { panic!("expected failure") };
        assert!(diff.contains("columns differ"));
    }

    #[test]
    fn test_dtype_mismatch() {
        let mut got = expected();
        got.dtypes[2] = ColumnType::Object;
        let Verdict::Fail(diff) = compare(&expected(), &got) else { panic!("expected failure") };
        assert!(diff.contains("dtype of column 'Amount' differs: expected float64, got object"));
    }

    fn produced(dtypes: [&str; 3]) -> Table {
        let payload = FramePayload {
            columns: vec!["Date".into(), "Description".into(), "Amount".into()],
            dtypes: dtypes.iter().map(|d| d.to_string()).collect(),
            default_index: true,
            data: vec![
                serde_json::json!(["01-08-2024", "Salary Credit", 50000.0])
                    .as_array()
                    .unwrap()
                    .clone(),
                serde_json::json!(["02-08-2024", "ATM Withdrawal", -2000.5])
                    .as_array()
                    .unwrap()
                    .clone(),
                serde_json::json!(["03-08-2024", "UPI Payment", -150.25])
                    .as_array()
                    .unwrap()
                    .clone(),
            ],
        };
        payload.into_table().unwrap()
    }

    #[test]
    fn test_narrower_or_extension_dtypes_fail() {
        assert!(compare(&expected(), &produced(["object", "object", "float64"])).is_pass());

        let Verdict::Fail(diff) = compare(&expected(), &produced(["object", "object", "float32"])) else {
            panic!("expected failure")
        };
        assert!(diff.contains("dtype of column 'Amount' differs: expected float64, got float32"));

        let Verdict::Fail(diff) = compare(&expected(), &produced(["string", "object", "float64"])) else {
            panic!("expected failure")
        };
        assert!(diff.contains("expected object, got string"));
    }

    #[test]
    fn test_no_float_tolerance() {
        let mut got = expected();
        got.rows[1][2] = Cell::Float(-2000.5000001);
        let Verdict::Fail(diff) = compare(&expected(), &got) else { panic!("expected failure") };
        assert!(diff.contains("row 1, column 'Amount'"));
    }

    #[test]
    fn test_nulls_match_and_index_checked() {
        let mut want = expected();
        want.rows[0][1] = Cell::Null;
        let mut got = want.clone();
        got.rows[0][1] = Cell::Float(f64::NAN);
        assert!(compare(&want, &got).is_pass());

        got.default_index = false;
        let Verdict::Fail(diff) = compare(&want, &got) else { panic!("expected failure") };
        assert!(diff.contains("index differs"));
    }
}
