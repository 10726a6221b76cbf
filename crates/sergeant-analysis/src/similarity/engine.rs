//! Weighted, memoized pairwise test similarity.

use sergeant_core::errors::DetectionError;
use sergeant_core::types::collections::{FxHashMap, FxHashSet};

use super::jaccard::{jaccard, jaccard_hashed, token_jaccard, token_set};
use super::types::{SimilarityConfig, SimilarityResult, ThresholdUpdate, Thresholds};
use crate::coverage::CoverageRecord;
use crate::features::{FeatureTable, TestFeatureSignature};
use crate::keys::similarity_to_feature_key;

/// Anything that scores a pair of similarity keys (`"<test>::<file>"`).
pub trait PairwiseSimilarity {
    /// Overall score in [0, 1]. Must be symmetric.
    fn similarity(&mut self, key_a: &str, key_b: &str) -> f64;
}

/// Owns the per-run coverage and feature tables plus the pair cache.
#[derive(Debug, Default)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
    coverage: FxHashMap<String, CoverageRecord>,
    features: FeatureTable,
    cache: FxHashMap<String, SimilarityResult>,
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    pub fn thresholds(&self) -> Thresholds {
        self.config.thresholds
    }

    /// Replace the coverage table (keyed by similarity key).
    pub fn set_coverage(&mut self, coverage: FxHashMap<String, CoverageRecord>) {
        self.coverage = coverage;
        self.cache.clear();
    }

    pub fn insert_coverage(&mut self, key: String, record: CoverageRecord) {
        self.coverage.insert(key, record);
        self.cache.clear();
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    /// Mutable feature table. Clears the pair cache.
    pub fn features_mut(&mut self) -> &mut FeatureTable {
        self.cache.clear();
        &mut self.features
    }

    /// Component scores for a pair, computed once per unordered pair.
    pub fn compare(&mut self, key_a: &str, key_b: &str) -> SimilarityResult {
        let cache_key = pair_key(key_a, key_b);
        if let Some(cached) = self.cache.get(&cache_key) {
            return *cached;
        }
        let result = self.compute(key_a, key_b);
        self.cache.insert(cache_key, result);
        result
    }

    fn compute(&self, key_a: &str, key_b: &str) -> SimilarityResult {
        let pair = pair_key(key_a, key_b);
        let coverage = self.coverage_similarity(key_a, key_b);

        let (mock, exception, structural) =
            match (self.features_for(key_a), self.features_for(key_b)) {
                (Ok(a), Ok(b)) => (
                    mock_similarity(a.mock_assertion_count, b.mock_assertion_count),
                    token_jaccard(&a.exception_pattern, &b.exception_pattern),
                    structural_similarity(&a.structural_signature, &b.structural_signature),
                ),
                (Err(e), _) | (_, Err(e)) => {
                    let error = DetectionError::Component {
                        component: "features",
                        pair: pair.clone(),
                        message: e.to_string(),
                    };
                    tracing::error!(error = %error, "feature similarity degraded to zero");
                    (0.0, 0.0, 0.0)
                }
            };

        let overall = self.config.overall(coverage, mock, exception, structural);
        tracing::trace!(
            pair = %pair,
            coverage,
            mock,
            exception,
            structural,
            overall,
            "pair scored"
        );
        SimilarityResult {
            coverage,
            mock,
            exception,
            structural,
            overall,
        }
    }

    /// Jaccard of covered lines; 0.0 when either test has no record.
    fn coverage_similarity(&self, key_a: &str, key_b: &str) -> f64 {
        match (self.coverage.get(key_a), self.coverage.get(key_b)) {
            (Some(a), Some(b)) => jaccard(a.covered_lines(), b.covered_lines()),
            _ => {
                tracing::debug!(key_a, key_b, "coverage missing for pair");
                0.0
            }
        }
    }

    /// Features behind a similarity key. A test without recorded features
    /// scores as having none.
    fn features_for(&self, similarity_key: &str) -> Result<&TestFeatureSignature, DetectionError> {
        static EMPTY: TestFeatureSignature = TestFeatureSignature {
            mock_assertion_count: 0,
            exception_pattern: String::new(),
            structural_signature: String::new(),
        };
        let key = similarity_to_feature_key(similarity_key)?;
        match self.features.require(&key) {
            Ok(features) => Ok(features),
            Err(e) => {
                tracing::debug!(error = %e, "using empty features");
                Ok(&EMPTY)
            }
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Drop the cache and both per-run tables.
    pub fn clear_all(&mut self) {
        self.cache.clear();
        self.coverage.clear();
        self.features.clear();
        tracing::debug!("cleared similarity state");
    }

    /// Apply in-range values and clear the cache, even when nothing
    /// changed.
    pub fn update_thresholds(&mut self, update: ThresholdUpdate) {
        let t = &mut self.config.thresholds;
        for (name, value, slot) in [
            ("exact_duplicate_threshold", update.exact_duplicate, &mut t.exact_duplicate),
            ("near_duplicate_threshold", update.near_duplicate, &mut t.near_duplicate),
            ("similar_pattern_threshold", update.similar_pattern, &mut t.similar_pattern),
        ] {
            match value {
                Some(v) if (0.0..=1.0).contains(&v) => {
                    *slot = v;
                    tracing::info!(threshold = name, value = v, "threshold updated");
                }
                Some(v) => tracing::warn!(threshold = name, value = v, "ignoring out-of-range threshold"),
                None => {}
            }
        }
        self.cache.clear();
    }
}

impl PairwiseSimilarity for SimilarityEngine {
    fn similarity(&mut self, key_a: &str, key_b: &str) -> f64 {
        self.compare(key_a, key_b).overall
    }
}

/// `"{min}:{max}"` of the two keys.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}

/// Token Jaccard of two structural signatures, ignoring the `func:` token.
/// Copies of one test body differ only in their names.
pub fn structural_similarity(a: &str, b: &str) -> f64 {
    fn shape(signature: &str) -> FxHashSet<&str> {
        let mut tokens = token_set(signature);
        tokens.retain(|t| !t.starts_with("func:"));
        tokens
    }
    jaccard_hashed(&shape(a), &shape(b))
}

/// Both zero → 1.0, one zero → 0.0, else `min / max`.
pub fn mock_similarity(a: usize, b: usize) -> f64 {
    match (a, b) {
        (0, 0) => 1.0,
        (0, _) | (_, 0) => 0.0,
        _ => a.min(b) as f64 / a.max(b) as f64,
    }
}
