//! Coverage instrumentation errors.

use super::error_code::{self, SergeantErrorCode};

/// Errors raised while executing a single test under coverage.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentationError {
    #[error("Coverage session could not be started: {message}")]
    SessionStart { message: String },

    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("Test {test_name} timed out after {timeout_ms}ms")]
    Timeout { test_name: String, timeout_ms: u64 },

    #[error("Coverage harness failed for {test_name}: {message}")]
    HarnessFailed { test_name: String, message: String },

    #[error("Test module for {test_name} failed to load: {message}")]
    TestLoad { test_name: String, message: String },

    #[error("Malformed coverage output: {message}")]
    MalformedOutput { message: String },
}

impl SergeantErrorCode for InstrumentationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => error_code::EXECUTION_TIMEOUT,
            _ => error_code::INSTRUMENTATION_ERROR,
        }
    }
}
