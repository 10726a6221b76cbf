//! Persistence errors.

use std::path::PathBuf;

use super::error_code::{self, SergeantErrorCode};

/// Errors raised by the JSON record store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Serialization failed for {path}: {message}")]
    Serialization { path: PathBuf, message: String },
}

impl SergeantErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        error_code::STORAGE_ERROR
    }
}
