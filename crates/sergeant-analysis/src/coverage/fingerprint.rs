//! Coverage fingerprints: a content hash, a numeric shape vector, and a
//! readable pattern derived from one [`CoverageRecord`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sergeant_core::types::collections::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

use super::types::CoverageRecord;
use crate::keys::feature_key;
use crate::similarity::jaccard::token_set;

pub const DEFAULT_FINGERPRINT_THRESHOLD: f64 = 0.8;

/// Coverage shape of a single test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageFingerprint {
    pub test_name: String,
    pub file_path: PathBuf,
    /// Hash of the metrics and sorted covered lines.
    pub signature_hash: String,
    /// `[percentage, line ratio, branch ratio, density, spread]`, each in [0, 1].
    pub signature_vector: Vec<f64>,
    /// `coverage:P%|lines:c/t|branches:c/t[|signature:s]`
    pub coverage_pattern: String,
    pub similarity_threshold: f64,
}

impl CoverageFingerprint {
    pub fn from_record(record: &CoverageRecord) -> Self {
        Self {
            test_name: record.test_name().to_string(),
            file_path: record.file_path().to_path_buf(),
            signature_hash: signature_hash(record),
            signature_vector: signature_vector(record),
            coverage_pattern: coverage_pattern(record),
            similarity_threshold: DEFAULT_FINGERPRINT_THRESHOLD,
        }
    }

    /// 1.0 for identical hashes, else cosine of the vectors, else Jaccard
    /// over pattern components.
    pub fn similarity(&self, other: &CoverageFingerprint) -> f64 {
        if !self.signature_hash.is_empty() && self.signature_hash == other.signature_hash {
            return 1.0;
        }
        if !self.signature_vector.is_empty() && !other.signature_vector.is_empty() {
            return cosine_similarity(&self.signature_vector, &other.signature_vector);
        }
        pattern_similarity(&self.coverage_pattern, &other.coverage_pattern)
    }
}

fn signature_hash(record: &CoverageRecord) -> String {
    let mut input = format!(
        "{}:{}:{}:{}:{}",
        record.lines_covered(),
        record.lines_total(),
        record.branches_covered(),
        record.branches_total(),
        record.coverage_percentage()
    );
    if !record.covered_lines().is_empty() {
        input.push(':');
        input.push_str(&join_lines(record));
    }
    format!("{:032x}", xxh3_128(input.as_bytes()))
}

fn join_lines(record: &CoverageRecord) -> String {
    record
        .covered_lines()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn signature_vector(record: &CoverageRecord) -> Vec<f64> {
    let total = record.lines_total().max(1) as f64;
    let lines: Vec<u32> = record.covered_lines().iter().copied().collect();

    let density = match lines.len() {
        0 => 0.0,
        1 => 1.0,
        n => {
            let gaps: u64 = lines.windows(2).map(|w| u64::from(w[1] - w[0])).sum();
            let avg_gap = gaps as f64 / (n - 1) as f64;
            1.0 / (1.0 + avg_gap)
        }
    };
    let spread = match (lines.first(), lines.last()) {
        (Some(min), Some(max)) => f64::from(max - min) / total,
        _ => 0.0,
    };

    vec![
        record.coverage_percentage() / 100.0,
        record.lines_covered() as f64 / total,
        record.branches_covered() as f64 / record.branches_total().max(1) as f64,
        density,
        spread,
    ]
}

fn coverage_pattern(record: &CoverageRecord) -> String {
    let mut parts = vec![
        format!("coverage:{:.1}%", record.coverage_percentage()),
        format!("lines:{}/{}", record.lines_covered(), record.lines_total()),
        format!(
            "branches:{}/{}",
            record.branches_covered(),
            record.branches_total()
        ),
    ];
    if let Some(sig) = record.coverage_signature().filter(|s| !s.is_empty()) {
        parts.push(format!("signature:{sig}"));
    }
    parts.join("|")
}

/// Cosine over the common prefix of both vectors, clamped to [0, 1].
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let dot: f64 = a[..n].iter().zip(&b[..n]).map(|(x, y)| x * y).sum();
    let mag_a = a[..n].iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b = b[..n].iter().map(|x| x * x).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

fn pattern_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (sa, sb) = (token_set(a), token_set(b));
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

/// Stores fingerprints by `"<file>:<test>"` and answers nearest-neighbour
/// queries over them.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    fingerprints: FxHashMap<String, CoverageFingerprint>,
    order: Vec<String>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint `record` and store it, replacing any previous entry.
    pub fn generate(&mut self, record: &CoverageRecord) -> CoverageFingerprint {
        let fingerprint = CoverageFingerprint::from_record(record);
        let key = feature_key(
            &record.file_path().display().to_string(),
            record.test_name(),
        );
        if self.fingerprints.insert(key.clone(), fingerprint.clone()).is_none() {
            self.order.push(key);
        }
        tracing::debug!(
            test_name = record.test_name(),
            hash = %fingerprint.signature_hash,
            "coverage fingerprint generated"
        );
        fingerprint
    }

    pub fn get(&self, key: &str) -> Option<&CoverageFingerprint> {
        self.fingerprints.get(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stored fingerprints scoring at least `threshold` against `target`,
    /// best first. Fingerprints of the same test are skipped.
    pub fn find_similar(
        &self,
        target: &CoverageFingerprint,
        threshold: f64,
    ) -> Vec<(&CoverageFingerprint, f64)> {
        let mut similar: Vec<(&CoverageFingerprint, f64)> = self
            .order
            .iter()
            .filter_map(|key| self.fingerprints.get(key))
            .filter(|fp| fp.test_name != target.test_name)
            .map(|fp| (fp, target.similarity(fp)))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        similar.sort_by(|a, b| b.1.total_cmp(&a.1));
        similar
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::coverage::types::BranchCounts;

    fn record(name: &str, covered: &[u32], missing: &[u32]) -> CoverageRecord {
        CoverageRecord::from_lines(
            name,
            "tests/test_fp.py",
            1,
            covered.iter().copied().collect::<BTreeSet<_>>(),
            missing.iter().copied().collect::<BTreeSet<_>>(),
            BranchCounts { covered: 2, total: 4 },
            Some("app.py:3".into()),
        )
    }

    #[test]
    fn vector_components() {
        let fp = CoverageFingerprint::from_record(&record("test_a", &[2, 4, 6], &[1, 3]));
        let v = &fp.signature_vector;
        assert!((v[0] - 0.6).abs() < 1e-9);
        assert!((v[1] - 0.6).abs() < 1e-9);
        assert!((v[2] - 0.5).abs() < 1e-9);
        // average gap 2
        assert!((v[3] - 1.0 / 3.0).abs() < 1e-9);
        // spread 4 over 5 lines
        assert!((v[4] - 0.8).abs() < 1e-9);
        assert_eq!(
            fp.coverage_pattern,
            "coverage:60.0%|lines:3/5|branches:2/4|signature:app.py:3"
        );
        assert_eq!(fp.signature_hash.len(), 32);
    }

    #[test]
    fn single_and_empty_lines_density() {
        let one = CoverageFingerprint::from_record(&record("t", &[7], &[]));
        assert_eq!(one.signature_vector[3], 1.0);
        let none = CoverageFingerprint::from_record(&record("t", &[], &[]));
        assert_eq!(none.signature_vector[3], 0.0);
        assert_eq!(none.signature_vector[4], 0.0);
    }

    #[test]
    fn identical_coverage_is_fully_similar() {
        let a = CoverageFingerprint::from_record(&record("test_a", &[1, 2], &[3]));
        let b = CoverageFingerprint::from_record(&record("test_b", &[1, 2], &[3]));
        assert_eq!(a.signature_hash, b.signature_hash);
        assert_eq!(a.similarity(&b), 1.0);
    }

    #[test]
    fn cosine_is_clamped_and_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn pattern_fallback_when_vectors_missing() {
        let mut a = CoverageFingerprint::from_record(&record("test_a", &[1], &[2]));
        let mut b = CoverageFingerprint::from_record(&record("test_b", &[2], &[1]));
        a.signature_vector.clear();
        b.signature_vector.clear();
        a.signature_hash = "x".into();
        b.signature_hash = "y".into();
        // coverage, lines, branches, signature parts all equal
        assert_eq!(a.similarity(&b), 1.0);
        b.coverage_pattern.clear();
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn find_similar_skips_self_and_sorts_descending() {
        let mut index = FingerprintIndex::new();
        let target = index.generate(&record("test_a", &[1, 2, 3], &[4]));
        index.generate(&record("test_b", &[1, 2, 3], &[4]));
        index.generate(&record("test_c", &[1, 9], &[2, 3, 4, 5, 6, 7, 8]));
        let found = index.find_similar(&target, 0.0);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0.test_name, "test_b");
        assert!(found[0].1 >= found[1].1);
        assert!(index.find_similar(&target, 1.0).iter().all(|(fp, _)| fp.test_name == "test_b"));
    }
}
