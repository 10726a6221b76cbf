//! Suite-level duplicate detection: features, similarity, clustering.

use std::path::PathBuf;

use sergeant_core::config::SergeantConfig;
use sergeant_core::errors::{PipelineError, PipelineResult};
use sergeant_core::types::collections::FxHashMap;

use crate::clustering::{cluster_tests, ClusterConfig, DuplicateCluster};
use crate::coverage::CoverageRecord;
use crate::parsers::PythonParser;
use crate::similarity::{SimilarityConfig, SimilarityEngine, ThresholdUpdate, Thresholds};

/// Finds clusters of duplicate tests in a suite, given per-test coverage.
pub struct DuplicateDetector {
    engine: SimilarityEngine,
    parser: Option<PythonParser>,
    min_cluster_size: usize,
    max_cluster_size: usize,
}

impl DuplicateDetector {
    /// Thresholds come from `similarity`; only the size bounds of
    /// `clusters` are used.
    pub fn new(similarity: SimilarityConfig, clusters: ClusterConfig) -> Self {
        Self {
            engine: SimilarityEngine::new(similarity),
            parser: None,
            min_cluster_size: clusters.min_cluster_size,
            max_cluster_size: clusters.max_cluster_size,
        }
    }

    pub fn from_config(config: &SergeantConfig) -> Self {
        Self::new(SimilarityConfig::from(config), ClusterConfig::from(config))
    }

    /// Extract features from every file, then cluster all recorded tests.
    ///
    /// `coverage` is keyed by `"<test>::<file>"` and replaces any previous
    /// table. Files that fail to parse are reported in the result's errors
    /// and contribute no tests.
    pub fn analyze_test_suite(
        &mut self,
        test_files: &[PathBuf],
        coverage: FxHashMap<String, CoverageRecord>,
    ) -> PipelineResult<Vec<DuplicateCluster>> {
        let mut result = PipelineResult::default();
        tracing::info!(files = test_files.len(), "starting duplicate detection");

        if self.parser.is_none() {
            match PythonParser::new() {
                Ok(parser) => self.parser = Some(parser),
                Err(e) => {
                    tracing::error!(error = %e, "cannot create python parser");
                    result.add_error(PipelineError::from(e));
                    return result;
                }
            }
        }
        let Some(parser) = self.parser.as_mut() else {
            return result;
        };

        self.engine.set_coverage(coverage);
        let features = self.engine.features_mut();
        for file in test_files {
            match features.analyze_file(parser, file) {
                Ok(count) => tracing::debug!(path = %file.display(), tests = count, "features extracted"),
                Err(e) => {
                    tracing::error!(path = %file.display(), error = %e, "failed to analyze test file");
                    result.add_error(PipelineError::from(e));
                }
            }
        }

        let keys = self.engine.features().keys().to_vec();
        let config = self.cluster_config();
        result.data = cluster_tests(&keys, &mut self.engine, &config);
        tracing::info!(clusters = result.data.len(), "duplicate detection finished");
        result
    }

    /// Cluster settings for the next run: the engine's current thresholds
    /// plus the configured size bounds.
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            thresholds: self.engine.thresholds(),
            min_cluster_size: self.min_cluster_size,
            max_cluster_size: self.max_cluster_size,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.engine.thresholds()
    }

    pub fn update_thresholds(&mut self, update: ThresholdUpdate) {
        self.engine.update_thresholds(update);
    }

    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SimilarityEngine {
        &mut self.engine
    }

    /// Forget the cache, coverage and features of previous runs.
    pub fn clear_cache(&mut self) {
        self.engine.clear_all();
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(SimilarityConfig::default(), ClusterConfig::default())
    }
}
