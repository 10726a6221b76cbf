//! SergeantErrorCode trait for structured error reporting.

/// Every error enum implements this to expose a stable, machine-readable
/// code alongside its human-readable message.
pub trait SergeantErrorCode {
    /// Returns the error code string (e.g., "PARSE_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const PARSE_ERROR: &str = "PARSE_ERROR";
pub const RESOLUTION_ERROR: &str = "RESOLUTION_ERROR";
pub const INSTRUMENTATION_ERROR: &str = "INSTRUMENTATION_ERROR";
pub const EXECUTION_TIMEOUT: &str = "EXECUTION_TIMEOUT";
pub const ANALYSIS_ERROR: &str = "ANALYSIS_ERROR";
pub const DETECTION_ERROR: &str = "DETECTION_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const PIPELINE_ERROR: &str = "PIPELINE_ERROR";
