//! Duplicate detection configuration: thresholds, cluster bounds, weights.

use serde::{Deserialize, Serialize};

/// Configuration for similarity scoring and clustering.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Score at or above which a cluster is exact. Default: 0.98.
    pub exact_duplicate_threshold: Option<f64>,
    /// Score at or above which a cluster is near-duplicate. Default: 0.85.
    pub near_duplicate_threshold: Option<f64>,
    /// Minimum pairwise score for cluster membership. Default: 0.70.
    pub similar_pattern_threshold: Option<f64>,
    /// Smallest cluster emitted. Default: 2.
    pub min_cluster_size: Option<usize>,
    /// Soft upper bound on cluster membership. Default: 10.
    pub max_cluster_size: Option<usize>,
    /// Default: 0.4.
    pub coverage_weight: Option<f64>,
    /// Default: 0.3.
    pub mock_assertion_weight: Option<f64>,
    /// Default: 0.2.
    pub exception_weight: Option<f64>,
    /// Default: 0.1.
    pub structure_weight: Option<f64>,
}

impl DuplicateConfig {
    pub fn effective_exact_duplicate_threshold(&self) -> f64 {
        self.exact_duplicate_threshold.unwrap_or(0.98)
    }

    pub fn effective_near_duplicate_threshold(&self) -> f64 {
        self.near_duplicate_threshold.unwrap_or(0.85)
    }

    pub fn effective_similar_pattern_threshold(&self) -> f64 {
        self.similar_pattern_threshold.unwrap_or(0.70)
    }

    pub fn effective_min_cluster_size(&self) -> usize {
        self.min_cluster_size.unwrap_or(2)
    }

    pub fn effective_max_cluster_size(&self) -> usize {
        self.max_cluster_size.unwrap_or(10)
    }

    pub fn effective_coverage_weight(&self) -> f64 {
        self.coverage_weight.unwrap_or(0.4)
    }

    pub fn effective_mock_assertion_weight(&self) -> f64 {
        self.mock_assertion_weight.unwrap_or(0.3)
    }

    pub fn effective_exception_weight(&self) -> f64 {
        self.exception_weight.unwrap_or(0.2)
    }

    pub fn effective_structure_weight(&self) -> f64 {
        self.structure_weight.unwrap_or(0.1)
    }
}
