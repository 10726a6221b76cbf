//! Parser errors.

use std::path::PathBuf;

use super::error_code::{self, SergeantErrorCode};

/// Errors that can occur while reading or parsing a Python test file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read {path}: {message}")]
    ReadFailed { path: PathBuf, message: String },

    #[error("Grammar could not be loaded: {message}")]
    GrammarNotLoaded { message: String },

    #[error("Tree-sitter error parsing {path}: {message}")]
    TreeSitterError { path: PathBuf, message: String },

    #[error("Function {name} not found in {path}")]
    FunctionNotFound { path: PathBuf, name: String },
}

impl SergeantErrorCode for ParseError {
    fn error_code(&self) -> &'static str {
        error_code::PARSE_ERROR
    }
}
