//! Persistence configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the JSON coverage store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the store. Default: ".drill-sergeant/coverage".
    pub path: Option<String>,
    /// Session/test records older than this are deleted on open. Default: 30.
    pub retention_days: Option<i64>,
    /// Default: true.
    pub enabled: Option<bool>,
}

impl StorageConfig {
    pub fn effective_path(&self) -> &str {
        self.path.as_deref().unwrap_or(".drill-sergeant/coverage")
    }

    pub fn effective_retention_days(&self) -> i64 {
        self.retention_days.unwrap_or(30)
    }

    pub fn effective_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}
