//! # stmtcraft-error
//!
//! Unified error handling for stmtcraft.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g., MissingSample, ExecutionFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Key-value pairs that help locate the cause
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use stmtcraft_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::MissingSample, "no CSV in data/icici")
//!         .with_operation("sample::locate")
//!         .with_context("target", "icici"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, stmtcraft_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the stmtcraft Error
pub type Result<T> = std::result::Result<T, Error>;
