//! Feature table for one analysis run, keyed by `"<file>:<test>"`.

use std::path::Path;

use sergeant_core::errors::{DetectionError, ParseError};
use sergeant_core::types::collections::FxHashMap;

use super::signature::{FeatureBuilder, TestFeatureSignature};
use crate::keys::feature_key;
use crate::parsers::PythonParser;

/// Features of every analyzed test, in discovery order.
#[derive(Debug, Default)]
pub struct FeatureTable {
    builder: FeatureBuilder,
    features: FxHashMap<String, TestFeatureSignature>,
    order: Vec<String>,
    errors: FxHashMap<String, String>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `path` and record features for each `test_*` function in it.
    /// Returns how many tests were recorded. Non-Python and missing files
    /// are skipped.
    pub fn analyze_file(&mut self, parser: &mut PythonParser, path: &Path) -> Result<usize, ParseError> {
        if path.extension().and_then(|e| e.to_str()) != Some("py") || !path.is_file() {
            tracing::debug!(path = %path.display(), "skipping non-python test file");
            return Ok(0);
        }
        let module = parser.parse_file(path)?;
        if module.has_errors() {
            tracing::warn!(path = %path.display(), "test file has syntax errors");
        }
        let file = path.display().to_string();
        let functions = module.test_functions();
        for function in &functions {
            let key = feature_key(&file, function.name());
            let signature = match self.builder.build(function) {
                Ok(signature) => {
                    self.errors.remove(&key);
                    signature
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "feature extraction failed");
                    self.errors.insert(key.clone(), e.to_string());
                    TestFeatureSignature::default()
                }
            };
            self.insert(key, signature);
        }
        Ok(functions.len())
    }

    pub fn insert(&mut self, key: String, signature: TestFeatureSignature) {
        if self.features.insert(key.clone(), signature).is_none() {
            self.order.push(key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&TestFeatureSignature> {
        self.features.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&TestFeatureSignature, DetectionError> {
        self.features
            .get(key)
            .ok_or_else(|| DetectionError::MissingFeatures {
                key: key.to_string(),
            })
    }

    /// Feature keys in the order tests were recorded.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// The `error` diagnostic recorded for a test whose extraction failed.
    pub fn error(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.features.clear();
        self.order.clear();
        self.errors.clear();
    }
}
