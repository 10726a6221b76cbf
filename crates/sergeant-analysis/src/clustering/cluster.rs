//! Single-pass transitive grouping of tests by pairwise similarity.

use std::path::PathBuf;

use sergeant_core::errors::DetectionError;
use sergeant_core::types::collections::{FxHashSet, SmallVec8};
use xxhash_rust::xxh3::xxh3_64;

use super::types::{ClusterConfig, ClusterType, DuplicateCluster};
use crate::keys::TestId;
use crate::similarity::PairwiseSimilarity;

/// Group feature keys (`"<file>:<test>"`) into duplicate clusters.
///
/// Each unprocessed key seeds a group and absorbs every later unprocessed
/// key scoring at least the similar-pattern threshold against the seed.
/// Groups smaller than `min_cluster_size` are dropped. Malformed keys are
/// logged and never clustered.
pub fn cluster_tests<S: PairwiseSimilarity + ?Sized>(
    keys: &[String],
    oracle: &mut S,
    config: &ClusterConfig,
) -> Vec<DuplicateCluster> {
    let ids: Vec<TestId> = keys
        .iter()
        .filter_map(|key| match TestId::from_feature_key(key) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "skipping test with malformed key");
                None
            }
        })
        .collect();
    let similarity_keys: Vec<String> = ids.iter().map(TestId::similarity_key).collect();

    let mut processed: FxHashSet<usize> = FxHashSet::default();
    let mut clusters = Vec::new();

    for seed in 0..ids.len() {
        if !processed.insert(seed) {
            continue;
        }
        let mut group: SmallVec8<usize> = SmallVec8::new();
        group.push(seed);
        for candidate in seed + 1..ids.len() {
            if processed.contains(&candidate) {
                continue;
            }
            let score = oracle.similarity(&similarity_keys[seed], &similarity_keys[candidate]);
            if score >= config.thresholds.similar_pattern {
                group.push(candidate);
                processed.insert(candidate);
            }
        }

        if group.len() < config.min_cluster_size {
            continue;
        }
        let members: Vec<&TestId> = group.iter().map(|&i| &ids[i]).collect();
        let member_keys: Vec<&str> = group.iter().map(|&i| similarity_keys[i].as_str()).collect();
        match build_cluster(&members, &member_keys, oracle, config) {
            Ok(cluster) => clusters.push(cluster),
            Err(e) => tracing::error!(error = %e, "failed to build cluster"),
        }
    }

    tracing::debug!(tests = ids.len(), clusters = clusters.len(), "clustering finished");
    clusters
}

fn build_cluster<S: PairwiseSimilarity + ?Sized>(
    members: &[&TestId],
    similarity_keys: &[&str],
    oracle: &mut S,
    config: &ClusterConfig,
) -> Result<DuplicateCluster, DetectionError> {
    let representative = members.first().ok_or(DetectionError::EmptyCluster)?;

    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..similarity_keys.len() {
        for j in i + 1..similarity_keys.len() {
            total += oracle.similarity(similarity_keys[i], similarity_keys[j]);
            pairs += 1;
        }
    }
    let similarity_score = if pairs == 0 { 0.0 } else { total / pairs as f64 };
    let cluster_type = ClusterType::classify(similarity_score, &config.thresholds);

    if members.len() > config.max_cluster_size {
        tracing::warn!(
            size = members.len(),
            max = config.max_cluster_size,
            representative = %representative.test_name,
            "cluster exceeds max_cluster_size"
        );
    }

    let tests: Vec<(String, PathBuf)> = members
        .iter()
        .map(|id| (id.test_name.clone(), PathBuf::from(&id.file_path)))
        .collect();
    Ok(DuplicateCluster {
        cluster_id: cluster_id(&representative.test_name, &representative.file_path),
        representative_test: tests[0].clone(),
        similarity_score,
        cluster_type,
        consolidation_suggestion: cluster_type.suggestion(tests.len()),
        tests,
    })
}

/// First 8 hex chars of the hash of `"{test}:{file}"`.
pub fn cluster_id(test_name: &str, file_path: &str) -> String {
    let full = format!("{:016x}", xxh3_64(format!("{test_name}:{file_path}").as_bytes()));
    full[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores every pair with a constant.
    struct Constant(f64);

    impl PairwiseSimilarity for Constant {
        fn similarity(&mut self, _: &str, _: &str) -> f64 {
            self.0
        }
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tests/test_m.py:test_{i}")).collect()
    }

    #[test]
    fn single_cluster_from_uniform_similarity() {
        let clusters = cluster_tests(&keys(3), &mut Constant(0.9), &ClusterConfig::default());
        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.cluster_type, ClusterType::NearDuplicates);
        assert_eq!(c.tests.len(), 3);
        assert_eq!(c.representative_test.0, "test_0");
        assert_eq!(c.cluster_id.len(), 8);
        assert_eq!(
            c.consolidation_suggestion,
            "Consider consolidating 3 similar tests using @pytest.mark.parametrize"
        );
    }

    #[test]
    fn malformed_keys_are_skipped() {
        let mut input = keys(2);
        input.push("no_separator".to_string());
        let clusters = cluster_tests(&input, &mut Constant(1.0), &ClusterConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].tests.len(), 2);
    }

    #[test]
    fn empty_member_list_is_an_error() {
        let result = build_cluster(&[], &[], &mut Constant(1.0), &ClusterConfig::default());
        assert!(matches!(result, Err(DetectionError::EmptyCluster)));
    }

    #[test]
    fn oversized_clusters_are_still_emitted() {
        let config = ClusterConfig {
            max_cluster_size: 2,
            ..ClusterConfig::default()
        };
        let clusters = cluster_tests(&keys(4), &mut Constant(1.0), &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 4);
    }
}
