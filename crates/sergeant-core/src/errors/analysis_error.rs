//! Static analysis errors for per-test feature extraction.

use super::error_code::{self, SergeantErrorCode};
use super::ParseError;

/// Errors raised while deriving static features or diagnostics from a test.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Test function {test_name} not found in {file}")]
    TestNotFound { file: String, test_name: String },

    #[error("Malformed node in {test_name}: {message}")]
    MalformedNode { test_name: String, message: String },

    #[error("Invalid coverage record: {message}")]
    InvalidRecord { message: String },
}

impl SergeantErrorCode for AnalysisError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(e) => e.error_code(),
            _ => error_code::ANALYSIS_ERROR,
        }
    }
}
