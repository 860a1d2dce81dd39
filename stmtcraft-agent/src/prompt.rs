//! Prompt construction for parser generation

use crate::sample::ExpectedSchema;

pub const SYSTEM_PROMPT: &str = "You are a senior Python engineer.";

/// Sample rows shown to the model
const PREVIEW_ROWS: usize = 5;

/// A system/user message pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// What the model needs to know about one attempt
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub target: &'a str,
    pub pdf_name: &'a str,
    pub attempt: u32,
    pub last_error: Option<&'a str>,
}

/// Build the prompt for an attempt. Pure.
pub fn build_prompt(schema: &ExpectedSchema, ctx: &PromptContext<'_>) -> Prompt {
    let columns: Vec<String> = schema.columns().iter().map(|c| format!("'{}'", c)).collect();
    let dtypes: String = schema
        .dtypes()
        .map(|(name, dtype)| format!("  - {}: {}\n", name, dtype))
        .collect();
    let preview = schema.table.preview_csv(PREVIEW_ROWS);

    let last_error = match ctx.last_error {
        Some(err) if !err.trim().is_empty() => err,
        _ => "None",
    };

    let user = format!(
        "You write parsers for bank statement PDFs.\n\
         Generate a Python module that defines:\n\
         \x20   def parse(pdf_path: str) -> pandas.DataFrame\n\
         \n\
         Requirements:\n\
         \x20 - Use pdfplumber to extract tables or text.\n\
         \x20 - Return a DataFrame with exactly these columns (in order): [{columns}].\n\
         \x20 - The result must equal pandas.read_csv of the reference CSV: same columns, \
         dtypes, row count, values and a default RangeIndex.\n\
         \x20 - Use only pandas, pdfplumber and the standard library (re is fine).\n\
         \x20 - Clean strings, trim spaces, cast numeric types as float/int where appropriate.\n\
         \x20 - Be deterministic and runnable without network access.\n\
         \x20 - Start the module with a docstring describing its purpose.\n\
         \x20 - Reply with the module source only.\n\
         \n\
         Column dtypes:\n\
         {dtypes}\
         \n\
         Reference CSV (first rows):\n\
         {preview}\
         \n\
         Bank name: {bank}.\n\
         Sample PDF: {pdf}.\n\
         Attempt #: {attempt}.\n\
         Last error summary:\n\
         {last_error}\n",
        columns = columns.join(", "),
        dtypes = dtypes,
        preview = preview,
        bank = ctx.target.to_uppercase(),
        pdf = ctx.pdf_name,
        attempt = ctx.attempt,
        last_error = last_error,
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    fn schema() -> ExpectedSchema {
        let table = Table::from_csv_str(
            "Date,Description,Amount\n\
             01-08-2024,Salary Credit,50000.0\n\
             02-08-2024,ATM Withdrawal,-2000.5\n\
             03-08-2024,UPI Payment,-150.25\n\
             04-08-2024,a,1\n05-08-2024,b,2\n06-08-2024,c,3\n",
        )
        .unwrap();
        ExpectedSchema { table }
    }

    #[test]
    fn test_first_attempt_prompt() {
        let ctx = PromptContext {
            target: "icici",
            pdf_name: "icici_sample.pdf",
            attempt: 1,
            last_error: None,
        };
        let prompt = build_prompt(&schema(), &ctx);

        assert_eq!(prompt.system, SYSTEM_PROMPT);
        assert!(prompt.user.contains("def parse(pdf_path: str) -> pandas.DataFrame"));
        assert!(prompt.user.contains("['Date', 'Description', 'Amount']"));
        assert!(prompt.user.contains("  - Amount: float64"));
        assert!(prompt.user.contains("Bank name: ICICI."));
        assert!(prompt.user.contains("Sample PDF: icici_sample.pdf."));
        assert!(prompt.user.contains("Attempt #: 1."));
        assert!(prompt.user.ends_with("Last error summary:\nNone\n"));
    }

    #[test]
    fn test_preview_is_capped() {
        let ctx = PromptContext {
            target: "icici",
            pdf_name: "x.pdf",
            attempt: 1,
            last_error: None,
        };
        let prompt = build_prompt(&schema(), &ctx);
        assert!(prompt.user.contains("05-08-2024,b,2.0"));
        assert!(!prompt.user.contains("06-08-2024"));
    }

    #[test]
    fn test_retry_prompt_carries_error_verbatim() {
        let error = "Traceback (most recent call last):\n  KeyError: 'Amount'";
        let ctx = PromptContext {
            target: "icici",
            pdf_name: "icici_sample.pdf",
            attempt: 2,
            last_error: Some(error),
        };
        let prompt = build_prompt(&schema(), &ctx);
        assert!(prompt.user.contains("Attempt #: 2."));
        assert!(prompt.user.contains(error));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let ctx = PromptContext {
            target: "sbi",
            pdf_name: "sbi.pdf",
            attempt: 3,
            last_error: Some("boom"),
        };
        assert_eq!(build_prompt(&schema(), &ctx), build_prompt(&schema(), &ctx));
    }
}
