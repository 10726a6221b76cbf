//! Test identity keys.
//!
//! Two key formats identify a test:
//! - feature key `"<file>:<test>"`, used by the feature table and clustering
//! - similarity key `"<test>::<file>"`, used by the coverage table
//!
//! All conversion between the two happens here.

use sergeant_core::errors::DetectionError;

/// A test function identified by name and containing file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestId {
    pub test_name: String,
    pub file_path: String,
}

impl TestId {
    pub fn new(test_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            file_path: file_path.into(),
        }
    }

    pub fn feature_key(&self) -> String {
        feature_key(&self.file_path, &self.test_name)
    }

    pub fn similarity_key(&self) -> String {
        similarity_key(&self.file_path, &self.test_name)
    }

    /// Parse a feature key. The test name is taken after the last `:`,
    /// so Windows drive letters in the file part survive.
    pub fn from_feature_key(key: &str) -> Result<Self, DetectionError> {
        match key.rsplit_once(':') {
            Some((file, test)) if !file.is_empty() && !test.is_empty() => {
                Ok(Self::new(test, file))
            }
            _ => Err(DetectionError::MalformedKey {
                key: key.to_string(),
            }),
        }
    }

    pub fn from_similarity_key(key: &str) -> Result<Self, DetectionError> {
        match key.split_once("::") {
            Some((test, file)) if !file.is_empty() && !test.is_empty() => {
                Ok(Self::new(test, file))
            }
            _ => Err(DetectionError::MalformedKey {
                key: key.to_string(),
            }),
        }
    }
}

/// `"<file>:<test>"`
pub fn feature_key(file_path: &str, test_name: &str) -> String {
    format!("{file_path}:{test_name}")
}

/// `"<test>::<file>"`
pub fn similarity_key(file_path: &str, test_name: &str) -> String {
    format!("{test_name}::{file_path}")
}

pub fn feature_to_similarity_key(key: &str) -> Result<String, DetectionError> {
    TestId::from_feature_key(key).map(|id| id.similarity_key())
}

pub fn similarity_to_feature_key(key: &str) -> Result<String, DetectionError> {
    TestId::from_similarity_key(key).map(|id| id.feature_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_and_similarity_keys_convert_both_ways() {
        let fk = feature_key("tests/test_a.py", "test_one");
        assert_eq!(fk, "tests/test_a.py:test_one");
        let sk = feature_to_similarity_key(&fk).unwrap();
        assert_eq!(sk, "test_one::tests/test_a.py");
        assert_eq!(similarity_to_feature_key(&sk).unwrap(), fk);
    }

    #[test]
    fn windows_drive_letter_survives() {
        let id = TestId::from_feature_key(r"C:\proj\tests\test_a.py:test_one").unwrap();
        assert_eq!(id.file_path, r"C:\proj\tests\test_a.py");
        assert_eq!(id.test_name, "test_one");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(TestId::from_feature_key("no_separator").is_err());
        assert!(TestId::from_feature_key("file.py:").is_err());
        assert!(TestId::from_similarity_key("test_only").is_err());
    }
}
