//! Error handling for drill-sergeant.
//! One error enum per subsystem, `thiserror` only.

pub mod analysis_error;
pub mod config_error;
pub mod detection_error;
pub mod error_code;
pub mod instrumentation_error;
pub mod parse_error;
pub mod pipeline_error;
pub mod resolution_error;
pub mod storage_error;

pub use analysis_error::AnalysisError;
pub use config_error::ConfigError;
pub use detection_error::DetectionError;
pub use error_code::SergeantErrorCode;
pub use instrumentation_error::InstrumentationError;
pub use parse_error::ParseError;
pub use pipeline_error::{PipelineError, PipelineResult};
pub use resolution_error::ResolutionError;
pub use storage_error::StorageError;
