//! Similarity and clustering errors.

use super::error_code::{self, SergeantErrorCode};

/// Errors raised while scoring a test pair or building a cluster.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Malformed test key: {key}")]
    MalformedKey { key: String },

    #[error("No features recorded for {key}")]
    MissingFeatures { key: String },

    #[error("Similarity component {component} failed for {pair}: {message}")]
    Component {
        component: &'static str,
        pair: String,
        message: String,
    },

    #[error("Cluster has no members")]
    EmptyCluster,
}

impl SergeantErrorCode for DetectionError {
    fn error_code(&self) -> &'static str {
        error_code::DETECTION_ERROR
    }
}
