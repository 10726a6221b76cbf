//! Persisted record shapes.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sergeant_analysis::coverage::{CoverageFingerprint, CoverageRecord};

/// Session-wide summary, one file per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_tests: usize,
    pub average_score: f64,
    pub coverage_files: usize,
    pub violations_found: usize,
    pub duration: String,
    /// Snapshot of the configuration the session ran with.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            total_tests: 0,
            average_score: 0.0,
            coverage_files: 0,
            violations_found: 0,
            duration: String::new(),
            config: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Quality score attached to a test record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestScore {
    pub score: f64,
    pub grade: String,
    pub efficiency_level: String,
}

/// Per-test record, keyed by sanitized test name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_name: String,
    pub test_file: String,
    pub score: f64,
    pub grade: String,
    pub efficiency_level: String,
    pub coverage_percentage: f64,
    pub signature_hash: String,
    #[serde(default)]
    pub covered_lines: Vec<u32>,
    #[serde(default)]
    pub missing_lines: Vec<u32>,
    #[serde(default)]
    pub violations: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

impl TestRecord {
    pub fn from_coverage(
        record: &CoverageRecord,
        fingerprint: &CoverageFingerprint,
        score: TestScore,
        violations: Vec<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            test_name: record.test_name().to_string(),
            test_file: record.file_path().display().to_string(),
            score: score.score,
            grade: score.grade,
            efficiency_level: score.efficiency_level,
            coverage_percentage: record.coverage_percentage(),
            signature_hash: fingerprint.signature_hash.clone(),
            covered_lines: record.covered_lines().iter().copied().collect(),
            missing_lines: record.missing_lines().iter().copied().collect(),
            violations,
            timestamp: Utc::now(),
            session_id: session_id.into(),
        }
    }
}

/// Per-source-file aggregate, keyed by sanitized path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_path: String,
    pub total_coverage: f64,
    #[serde(default)]
    pub tests_covering: Vec<String>,
    #[serde(default)]
    pub scores: Vec<f64>,
    pub average_score: f64,
    pub last_updated: DateTime<Utc>,
    pub session_id: String,
}

impl FileRecord {
    /// `average_score` is the mean of `scores`, 0 when there are none.
    pub fn new(
        file_path: &Path,
        total_coverage: f64,
        tests_covering: Vec<String>,
        scores: Vec<f64>,
        session_id: impl Into<String>,
    ) -> Self {
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        Self {
            file_path: file_path.display().to_string(),
            total_coverage,
            tests_covering,
            scores,
            average_score,
            last_updated: Utc::now(),
            session_id: session_id.into(),
        }
    }
}

/// One entry of the append-only signature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub test_name: String,
    pub signature_hash: String,
    #[serde(default)]
    pub signature_vector: Vec<f64>,
    pub signature_pattern: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

impl SignatureRecord {
    pub fn from_fingerprint(fingerprint: &CoverageFingerprint, session_id: impl Into<String>) -> Self {
        Self {
            test_name: fingerprint.test_name.clone(),
            signature_hash: fingerprint.signature_hash.clone(),
            signature_vector: fingerprint.signature_vector.clone(),
            signature_pattern: fingerprint.coverage_pattern.clone(),
            timestamp: Utc::now(),
            session_id: session_id.into(),
        }
    }
}

/// On-disk shape of `signatures/signatures.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignatureCollection {
    #[serde(default)]
    pub signatures: Vec<SignatureRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarSignature {
    #[serde(flatten)]
    pub record: SignatureRecord,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
}

/// Aggregates over the sessions of a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageTrends {
    pub period_days: i64,
    pub session_count: usize,
    pub average_score: f64,
    pub total_violations: usize,
    pub score_trend: Trend,
    pub violation_trend: Trend,
}

impl CoverageTrends {
    /// `sessions` must be in chronological order and non-empty.
    pub fn from_sessions(period_days: i64, sessions: &[SessionRecord]) -> Option<Self> {
        let (first, last) = (sessions.first()?, sessions.last()?);
        let many = sessions.len() > 1;
        let score_trend = if many && last.average_score > first.average_score {
            Trend::Improving
        } else {
            Trend::Declining
        };
        let violation_trend = if many && last.violations_found < first.violations_found {
            Trend::Improving
        } else {
            Trend::Declining
        };
        Some(Self {
            period_days,
            session_count: sessions.len(),
            average_score: sessions.iter().map(|s| s.average_score).sum::<f64>()
                / sessions.len() as f64,
            total_violations: sessions.iter().map(|s| s.violations_found).sum(),
            score_trend,
            violation_trend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(score: f64, violations: usize) -> SessionRecord {
        SessionRecord {
            average_score: score,
            violations_found: violations,
            ..SessionRecord::new("s")
        }
    }

    #[test]
    fn file_record_averages_scores() {
        let record = FileRecord::new(Path::new("src/app.py"), 80.0, vec![], vec![60.0, 90.0], "s1");
        assert_eq!(record.average_score, 75.0);
        let empty = FileRecord::new(Path::new("src/app.py"), 80.0, vec![], vec![], "s1");
        assert_eq!(empty.average_score, 0.0);
    }

    #[test]
    fn single_session_trends_are_declining() {
        let trends = CoverageTrends::from_sessions(7, &[session(90.0, 0)]).unwrap();
        assert_eq!(trends.score_trend, Trend::Declining);
        assert_eq!(trends.violation_trend, Trend::Declining);
    }

    #[test]
    fn trends_compare_first_and_last_session() {
        let sessions = [session(60.0, 5), session(10.0, 9), session(80.0, 2)];
        let trends = CoverageTrends::from_sessions(7, &sessions).unwrap();
        assert_eq!(trends.session_count, 3);
        assert_eq!(trends.average_score, 50.0);
        assert_eq!(trends.total_violations, 16);
        assert_eq!(trends.score_trend, Trend::Improving);
        assert_eq!(trends.violation_trend, Trend::Improving);
    }

    #[test]
    fn no_sessions_no_trends() {
        assert!(CoverageTrends::from_sessions(7, &[]).is_none());
    }

    #[test]
    fn similar_signature_flattens_record() {
        let similar = SimilarSignature {
            record: SignatureRecord {
                test_name: "test_a".into(),
                signature_hash: "abc".into(),
                signature_vector: vec![1.0],
                signature_pattern: "coverage:50.0%".into(),
                timestamp: Utc::now(),
                session_id: "s".into(),
            },
            similarity_score: 0.9,
        };
        let json = serde_json::to_value(&similar).unwrap();
        assert_eq!(json["test_name"], "test_a");
        assert_eq!(json["similarity_score"], 0.9);
    }
}
