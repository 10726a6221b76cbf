use sergeant_analysis::clustering::{cluster_id, cluster_tests, ClusterConfig, ClusterType};
use sergeant_analysis::similarity::PairwiseSimilarity;
use sergeant_core::types::collections::FxHashMap;

/// Returns a fixed score per unordered pair of test names, 0.0 otherwise.
#[derive(Default)]
struct TableOracle {
    scores: FxHashMap<(String, String), f64>,
    calls: usize,
}

impl TableOracle {
    fn with(mut self, a: &str, b: &str, score: f64) -> Self {
        self.scores.insert(ordered(a, b), score);
        self
    }
}

fn test_name(similarity_key: &str) -> String {
    similarity_key
        .split_once("::")
        .map(|(t, _)| t.to_string())
        .unwrap_or_default()
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl PairwiseSimilarity for TableOracle {
    fn similarity(&mut self, key_a: &str, key_b: &str) -> f64 {
        self.calls += 1;
        let pair = ordered(&test_name(key_a), &test_name(key_b));
        self.scores.get(&pair).copied().unwrap_or(0.0)
    }
}

fn keys(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|n| format!("tests/test_suite.py:{n}"))
        .collect()
}

fn classify_pair(score: f64) -> Option<ClusterType> {
    let mut oracle = TableOracle::default().with("test_a", "test_b", score);
    let clusters = cluster_tests(&keys(&["test_a", "test_b"]), &mut oracle, &ClusterConfig::default());
    clusters.first().map(|c| c.cluster_type)
}

#[test]
fn threshold_boundaries() {
    assert_eq!(classify_pair(0.98), Some(ClusterType::ExactDuplicates));
    assert_eq!(classify_pair(0.979), Some(ClusterType::NearDuplicates));
    assert_eq!(classify_pair(0.85), Some(ClusterType::NearDuplicates));
    assert_eq!(classify_pair(0.849), Some(ClusterType::SimilarPatterns));
    assert_eq!(classify_pair(0.70), Some(ClusterType::SimilarPatterns));
    assert_eq!(classify_pair(0.699), None);
}

#[test]
fn suggestions_name_member_count() {
    assert_eq!(
        ClusterType::ExactDuplicates.suggestion(2),
        "Consider consolidating 2 identical tests into a single parametrized test"
    );
    assert_eq!(
        ClusterType::SimilarPatterns.suggestion(4),
        "Review 4 tests for potential consolidation opportunities"
    );
}

#[test]
fn min_cluster_size_filters_groups() {
    let mut oracle = TableOracle::default().with("test_a", "test_b", 0.9);
    let config = ClusterConfig {
        min_cluster_size: 3,
        ..ClusterConfig::default()
    };
    assert!(cluster_tests(&keys(&["test_a", "test_b", "test_c"]), &mut oracle, &config).is_empty());
}

#[test]
fn grouping_is_seeded_by_first_unprocessed_test() {
    // b joins a; c only resembles b, so it is compared against a and left out
    let mut oracle = TableOracle::default()
        .with("test_a", "test_b", 0.9)
        .with("test_b", "test_c", 0.95);
    let clusters = cluster_tests(
        &keys(&["test_a", "test_b", "test_c"]),
        &mut oracle,
        &ClusterConfig::default(),
    );
    assert_eq!(clusters.len(), 1);
    let names: Vec<&str> = clusters[0].tests.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["test_a", "test_b"]);
}

#[test]
fn score_is_mean_over_all_pairs() {
    let mut oracle = TableOracle::default()
        .with("test_a", "test_b", 1.0)
        .with("test_a", "test_c", 1.0)
        .with("test_b", "test_c", 0.4);
    let clusters = cluster_tests(
        &keys(&["test_a", "test_b", "test_c"]),
        &mut oracle,
        &ClusterConfig::default(),
    );
    assert_eq!(clusters.len(), 1);
    assert!((clusters[0].similarity_score - 0.8).abs() < 1e-12);
    assert_eq!(clusters[0].cluster_type, ClusterType::SimilarPatterns);
}

#[test]
fn representative_and_id_are_stable() {
    let run = || {
        let mut oracle = TableOracle::default().with("test_x", "test_y", 1.0);
        cluster_tests(&keys(&["test_x", "test_y"]), &mut oracle, &ClusterConfig::default())
    };
    let first = run();
    let second = run();
    assert_eq!(first[0].cluster_id, second[0].cluster_id);
    assert_eq!(first[0].representative_test.0, "test_x");
    assert_eq!(
        first[0].cluster_id,
        cluster_id("test_x", "tests/test_suite.py")
    );
}

#[test]
fn cluster_type_serializes_snake_case() {
    let json = serde_json::to_string(&ClusterType::NearDuplicates).unwrap();
    assert_eq!(json, "\"near_duplicates\"");
}
