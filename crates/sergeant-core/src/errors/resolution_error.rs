//! Source file resolution errors.

use std::path::PathBuf;

use super::error_code::{self, SergeantErrorCode};

/// Errors raised while discovering the source files a test exercises.
/// Always recovered by the resolver's fallback path.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Test file has no parent directory: {path}")]
    NoParent { path: PathBuf },

    #[error("Import analysis failed for {path}: {message}")]
    ImportAnalysis { path: PathBuf, message: String },

    #[error("Directory traversal failed at {path}: {message}")]
    Traversal { path: PathBuf, message: String },
}

impl SergeantErrorCode for ResolutionError {
    fn error_code(&self) -> &'static str {
        error_code::RESOLUTION_ERROR
    }
}
