//! Per-test coverage record.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sergeant_core::errors::AnalysisError;

/// Tolerance used when comparing coverage percentages.
pub const PERCENTAGE_TOLERANCE: f64 = 0.1;

/// Coverage of one test function. Built once, never mutated; enhancement
/// produces a new record through [`CoverageRecord::with_signature`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRecord {
    test_name: String,
    file_path: PathBuf,
    line_number: u32,
    lines_covered: usize,
    lines_total: usize,
    branches_covered: usize,
    branches_total: usize,
    coverage_percentage: f64,
    covered_lines: BTreeSet<u32>,
    missing_lines: BTreeSet<u32>,
    #[serde(default)]
    coverage_signature: Option<String>,
}

/// Branch counts for a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchCounts {
    pub covered: usize,
    pub total: usize,
}

impl CoverageRecord {
    /// Build a record from line sets. Lines present in both sets count as
    /// covered, and the counts and percentage are derived from the sets.
    pub fn from_lines(
        test_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        line_number: u32,
        covered_lines: BTreeSet<u32>,
        missing_lines: BTreeSet<u32>,
        branches: BranchCounts,
        coverage_signature: Option<String>,
    ) -> Self {
        let missing_lines: BTreeSet<u32> =
            missing_lines.difference(&covered_lines).copied().collect();
        let lines_covered = covered_lines.len();
        let lines_total = lines_covered + missing_lines.len();
        Self {
            test_name: test_name.into(),
            file_path: file_path.into(),
            line_number,
            lines_covered,
            lines_total,
            branches_covered: branches.covered,
            branches_total: branches.total,
            coverage_percentage: percentage(lines_covered, lines_total),
            covered_lines,
            missing_lines,
            coverage_signature,
        }
    }

    /// The zeroed record returned whenever collection fails.
    pub fn empty(test_name: impl Into<String>, file_path: impl Into<PathBuf>, line_number: u32) -> Self {
        Self::from_lines(
            test_name,
            file_path,
            line_number,
            BTreeSet::new(),
            BTreeSet::new(),
            BranchCounts::default(),
            None,
        )
    }

    /// A copy of this record carrying a different signature.
    pub fn with_signature(&self, signature: impl Into<String>) -> Self {
        Self {
            coverage_signature: Some(signature.into()),
            ..self.clone()
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn lines_covered(&self) -> usize {
        self.lines_covered
    }

    pub fn lines_total(&self) -> usize {
        self.lines_total
    }

    pub fn branches_covered(&self) -> usize {
        self.branches_covered
    }

    pub fn branches_total(&self) -> usize {
        self.branches_total
    }

    pub fn coverage_percentage(&self) -> f64 {
        self.coverage_percentage
    }

    pub fn covered_lines(&self) -> &BTreeSet<u32> {
        &self.covered_lines
    }

    pub fn missing_lines(&self) -> &BTreeSet<u32> {
        &self.missing_lines
    }

    pub fn coverage_signature(&self) -> Option<&str> {
        self.coverage_signature.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.lines_total == 0
    }

    /// Plain JSON object; line sets render as sorted arrays.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "test_name": self.test_name,
            "file_path": self.file_path.display().to_string(),
            "line_number": self.line_number,
            "lines_covered": self.lines_covered,
            "lines_total": self.lines_total,
            "branches_covered": self.branches_covered,
            "branches_total": self.branches_total,
            "coverage_percentage": self.coverage_percentage,
            "covered_lines": self.covered_lines,
            "missing_lines": self.missing_lines,
            "coverage_signature": self.coverage_signature,
        })
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, AnalysisError> {
        let record: Self =
            serde_json::from_value(value).map_err(|e| AnalysisError::InvalidRecord {
                message: e.to_string(),
            })?;
        if !record.covered_lines.is_disjoint(&record.missing_lines) {
            return Err(AnalysisError::InvalidRecord {
                message: "covered_lines and missing_lines overlap".to_string(),
            });
        }
        if record.covered_lines.contains(&0) || record.missing_lines.contains(&0) {
            return Err(AnalysisError::InvalidRecord {
                message: "line numbers must be positive".to_string(),
            });
        }
        Ok(record)
    }
}

/// Two records are equal when every field matches exactly, except the
/// percentage (within [`PERCENTAGE_TOLERANCE`]) and the signature (ignored).
impl PartialEq for CoverageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.test_name == other.test_name
            && self.file_path == other.file_path
            && self.line_number == other.line_number
            && self.lines_covered == other.lines_covered
            && self.lines_total == other.lines_total
            && self.branches_covered == other.branches_covered
            && self.branches_total == other.branches_total
            && (self.coverage_percentage - other.coverage_percentage).abs() < PERCENTAGE_TOLERANCE
            && self.covered_lines == other.covered_lines
            && self.missing_lines == other.missing_lines
    }
}

/// `covered / total * 100`, or 0.0 when nothing is executable.
pub fn percentage(covered: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}
