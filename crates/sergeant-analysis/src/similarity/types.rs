//! Similarity scores, weights and thresholds.

use serde::{Deserialize, Serialize};
use sergeant_core::config::SergeantConfig;

/// Per-component scores for an unordered test pair, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub coverage: f64,
    pub mock: f64,
    pub exception: f64,
    pub structural: f64,
    pub overall: f64,
}

/// Classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub exact_duplicate: f64,
    pub near_duplicate: f64,
    pub similar_pattern: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            exact_duplicate: 0.98,
            near_duplicate: 0.85,
            similar_pattern: 0.70,
        }
    }
}

/// Partial threshold update. Values outside [0, 1] are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdUpdate {
    pub exact_duplicate: Option<f64>,
    pub near_duplicate: Option<f64>,
    pub similar_pattern: Option<f64>,
}

/// Resolved weights and thresholds for a [`super::SimilarityEngine`].
/// Weights are not required to sum to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityConfig {
    pub coverage_weight: f64,
    pub mock_assertion_weight: f64,
    pub exception_weight: f64,
    pub structure_weight: f64,
    pub thresholds: Thresholds,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            coverage_weight: 0.4,
            mock_assertion_weight: 0.3,
            exception_weight: 0.2,
            structure_weight: 0.1,
            thresholds: Thresholds::default(),
        }
    }
}

impl From<&SergeantConfig> for SimilarityConfig {
    fn from(config: &SergeantConfig) -> Self {
        let d = &config.duplicates;
        Self {
            coverage_weight: d.effective_coverage_weight(),
            mock_assertion_weight: d.effective_mock_assertion_weight(),
            exception_weight: d.effective_exception_weight(),
            structure_weight: d.effective_structure_weight(),
            thresholds: Thresholds {
                exact_duplicate: d.effective_exact_duplicate_threshold(),
                near_duplicate: d.effective_near_duplicate_threshold(),
                similar_pattern: d.effective_similar_pattern_threshold(),
            },
        }
    }
}

impl SimilarityConfig {
    pub fn overall(&self, coverage: f64, mock: f64, exception: f64, structural: f64) -> f64 {
        coverage * self.coverage_weight
            + mock * self.mock_assertion_weight
            + exception * self.exception_weight
            + structural * self.structure_weight
    }
}
