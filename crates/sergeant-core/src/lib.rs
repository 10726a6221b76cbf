//! sergeant-core: errors, configuration, tracing, and shared collection types
//! for the drill-sergeant duplicate-test engine.

pub mod config;
pub mod errors;
pub mod tracing;
pub mod types;
