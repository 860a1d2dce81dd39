//! Error kinds for stmtcraft operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to decide whether a failure aborts the run
/// or only costs one attempt of the refinement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Sample data errors (fatal before the first attempt)
    // =========================================================================
    /// The target's sample PDF or CSV is absent
    MissingSample,

    /// The sample CSV exists but cannot be loaded as a table
    SampleInvalid,

    // =========================================================================
    // Generation errors
    // =========================================================================
    /// The generation service call failed
    GenerationFailed,

    /// The generation service answered with nothing usable
    EmptyGeneration,

    /// Rate limit exceeded
    RateLimited,

    /// Authentication against the generation service failed
    AuthenticationFailed,

    // =========================================================================
    // Parser file / execution errors
    // =========================================================================
    /// Writing the generated parser failed
    WriteFailed,

    /// The generated parser raised or could not be run
    ExecutionFailed,

    /// The generated parser ran past the execution timeout
    ExecutionTimeout,

    /// The parser module does not honour `parse(pdf_path) -> DataFrame`
    ContractViolation,

    /// The produced table differs from the expected one
    ValidationMismatch,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    /// Failed to parse input
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Sample
            ErrorKind::MissingSample => "MissingSample",
            ErrorKind::SampleInvalid => "SampleInvalid",

            // Generation
            ErrorKind::GenerationFailed => "GenerationFailed",
            ErrorKind::EmptyGeneration => "EmptyGeneration",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            // Parser
            ErrorKind::WriteFailed => "WriteFailed",
            ErrorKind::ExecutionFailed => "ExecutionFailed",
            ErrorKind::ExecutionTimeout => "ExecutionTimeout",
            ErrorKind::ContractViolation => "ContractViolation",
            ErrorKind::ValidationMismatch => "ValidationMismatch",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::GenerationFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ExecutionTimeout
        )
    }

    /// Whether a failure of this kind is absorbed by the refinement loop
    /// (it costs one attempt) rather than aborting the run.
    pub fn consumes_attempt(&self) -> bool {
        !matches!(
            self,
            ErrorKind::MissingSample
                | ErrorKind::SampleInvalid
                | ErrorKind::ConfigInvalid
                | ErrorKind::InvalidArgument
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::MissingSample.to_string(), "MissingSample");
        assert_eq!(ErrorKind::EmptyGeneration.to_string(), "EmptyGeneration");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::MissingSample.is_retryable());
        assert!(!ErrorKind::ContractViolation.is_retryable());
    }

    #[test]
    fn test_consumes_attempt() {
        assert!(ErrorKind::EmptyGeneration.consumes_attempt());
        assert!(ErrorKind::WriteFailed.consumes_attempt());
        assert!(ErrorKind::ValidationMismatch.consumes_attempt());
        assert!(!ErrorKind::MissingSample.consumes_attempt());
        assert!(!ErrorKind::SampleInvalid.consumes_attempt());
    }
}
