//! Duplicate clusters and their classification.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sergeant_core::config::SergeantConfig;

use crate::similarity::Thresholds;

/// How close the members of a cluster are, by mean pairwise similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    ExactDuplicates,
    NearDuplicates,
    SimilarPatterns,
}

impl ClusterType {
    pub fn classify(score: f64, thresholds: &Thresholds) -> Self {
        if score >= thresholds.exact_duplicate {
            Self::ExactDuplicates
        } else if score >= thresholds.near_duplicate {
            Self::NearDuplicates
        } else {
            Self::SimilarPatterns
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ExactDuplicates => "exact_duplicates",
            Self::NearDuplicates => "near_duplicates",
            Self::SimilarPatterns => "similar_patterns",
        }
    }

    pub fn suggestion(&self, members: usize) -> String {
        match self {
            Self::ExactDuplicates => format!(
                "Consider consolidating {members} identical tests into a single parametrized test"
            ),
            Self::NearDuplicates => format!(
                "Consider consolidating {members} similar tests using @pytest.mark.parametrize"
            ),
            Self::SimilarPatterns => {
                format!("Review {members} tests for potential consolidation opportunities")
            }
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A group of tests whose pairwise similarity cleared the inclusion threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub cluster_id: String,
    /// `(test_name, file_path)` in population order.
    pub tests: Vec<(String, PathBuf)>,
    pub similarity_score: f64,
    pub cluster_type: ClusterType,
    pub representative_test: (String, PathBuf),
    pub consolidation_suggestion: String,
}

impl DuplicateCluster {
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Thresholds and size bounds for one clustering pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    pub thresholds: Thresholds,
    pub min_cluster_size: usize,
    /// Clusters above this size are still emitted, with a warning.
    pub max_cluster_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            min_cluster_size: 2,
            max_cluster_size: 10,
        }
    }
}

impl From<&SergeantConfig> for ClusterConfig {
    fn from(config: &SergeantConfig) -> Self {
        let d = &config.duplicates;
        Self {
            thresholds: Thresholds {
                exact_duplicate: d.effective_exact_duplicate_threshold(),
                near_duplicate: d.effective_near_duplicate_threshold(),
                similar_pattern: d.effective_similar_pattern_threshold(),
            },
            min_cluster_size: d.effective_min_cluster_size(),
            max_cluster_size: d.effective_max_cluster_size(),
        }
    }
}
