//! Duplicate clustering over a pairwise similarity oracle.

pub mod cluster;
pub mod types;

pub use cluster::{cluster_id, cluster_tests};
pub use types::{ClusterConfig, ClusterType, DuplicateCluster};
