//! Multi-factor test similarity: coverage, mock usage, exceptions, structure.

pub mod engine;
pub mod jaccard;
pub mod types;

pub use engine::{pair_key, structural_similarity, PairwiseSimilarity, SimilarityEngine};
pub use types::{SimilarityConfig, SimilarityResult, ThresholdUpdate, Thresholds};
