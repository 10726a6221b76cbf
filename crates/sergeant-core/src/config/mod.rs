//! Configuration system with 4-layer resolution.

pub mod coverage_config;
pub mod duplicate_config;
pub mod sergeant_config;
pub mod storage_config;

pub use coverage_config::CoverageConfig;
pub use duplicate_config::DuplicateConfig;
pub use sergeant_config::{CliOverrides, SergeantConfig};
pub use storage_config::StorageConfig;
