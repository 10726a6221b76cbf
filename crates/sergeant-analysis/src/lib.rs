//! sergeant-analysis: coverage-driven duplicate test detection for Python
//! test suites.
//!
//! Pipeline: [`coverage::CoverageExtractor`] collects one
//! [`coverage::CoverageRecord`] per test, [`features::FeatureTable`] derives
//! static features, [`similarity::SimilarityEngine`] scores test pairs, and
//! [`clustering::cluster_tests`] groups them into
//! [`clustering::DuplicateCluster`]s. [`detector::DuplicateDetector`] runs
//! the last three steps over a whole suite.

pub mod clustering;
pub mod coverage;
pub mod detector;
pub mod features;
pub mod keys;
pub mod parsers;
pub mod similarity;

pub use clustering::{ClusterType, DuplicateCluster};
pub use coverage::{CoverageExtractor, CoverageRecord};
pub use detector::DuplicateDetector;
