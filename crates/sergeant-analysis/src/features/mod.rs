//! Static test features used by the similarity engine.

pub mod signature;
pub mod table;

pub use signature::{FeatureBuilder, TestFeatureSignature, MOCK_ASSERTIONS};
pub use table::FeatureTable;
