//! Coverage extraction configuration.

use serde::{Deserialize, Serialize};

/// Configuration for per-test coverage collection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoverageConfig {
    /// Python interpreter used to run the coverage harness. Default: "python3".
    pub python: Option<String>,
    /// Per-test execution timeout in seconds. Default: 60.
    pub timeout_secs: Option<u64>,
    /// Parent directories walked during source discovery. Default: 5.
    pub max_parent_depth: Option<usize>,
    /// Cap on import-prioritized source files. Default: 20.
    pub max_selected_files: Option<usize>,
    /// Cap on candidates when no import resolves. Default: 50.
    pub max_candidate_files: Option<usize>,
}

impl CoverageConfig {
    pub fn effective_python(&self) -> &str {
        self.python.as_deref().unwrap_or("python3")
    }

    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(60)
    }

    pub fn effective_max_parent_depth(&self) -> usize {
        self.max_parent_depth.unwrap_or(5)
    }

    pub fn effective_max_selected_files(&self) -> usize {
        self.max_selected_files.unwrap_or(20)
    }

    pub fn effective_max_candidate_files(&self) -> usize {
        self.max_candidate_files.unwrap_or(50)
    }
}
