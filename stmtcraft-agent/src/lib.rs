//! # stmtcraft Agent
//!
//! The agent teaches itself to parse one bank's statement PDFs:
//! 1. Load the sample PDF and the CSV table it should produce
//! 2. Ask the LLM for a Python `parse(pdf_path)` module
//! 3. Save it as `custom_parser/<bank>_parser.py`
//! 4. Run it on the sample and compare the DataFrame with the CSV
//! 5. On failure, feed the error back and try again, at most 3 times
//!
//! The LLM writes the code, the Python runtime runs it, the CSV judges it.

mod config;
mod controller;
mod executor;
mod generator;
mod prompt;
mod sample;
mod table;
mod validator;
mod verify;
mod writer;

pub use config::{
    AgentConfig, DEFAULT_EXEC_TIMEOUT_SECS, DEFAULT_PYTHON, DEFAULT_TEMPERATURE, MAX_ATTEMPTS,
};
pub use controller::{
    Attempt, Failure, Phase, Progress, RefinementController, RunReport, RunState, RunStatus,
};
pub use executor::{ParserRuntime, PythonRuntime};
pub use generator::{extract_code, CodeGenerator};
pub use prompt::{build_prompt, Prompt, PromptContext, SYSTEM_PROMPT};
pub use sample::{ExpectedSchema, SampleFiles, SampleSet, SchemaReader, Target};
pub use table::{Cell, ColumnType, FramePayload, Table};
pub use validator::{compare, Verdict};
pub use verify::verify_target;
pub use writer::ParserWriter;
