use std::collections::BTreeSet;

use proptest::prelude::*;
use sergeant_analysis::coverage::{BranchCounts, CoverageRecord};
use sergeant_analysis::features::TestFeatureSignature;
use sergeant_analysis::keys::{feature_key, similarity_key};
use sergeant_analysis::similarity::jaccard::jaccard;
use sergeant_analysis::similarity::{PairwiseSimilarity, SimilarityConfig, SimilarityEngine};

fn record(name: &str, file: &str, covered: BTreeSet<u32>) -> CoverageRecord {
    CoverageRecord::from_lines(
        name,
        file,
        1,
        covered,
        BTreeSet::new(),
        BranchCounts::default(),
        None,
    )
}

fn engine_with(
    a: BTreeSet<u32>,
    b: BTreeSet<u32>,
    mocks: (usize, usize),
    exceptions: (&str, &str),
) -> (SimilarityEngine, String, String) {
    let mut engine = SimilarityEngine::new(SimilarityConfig::default());
    let ka = similarity_key("tests/test_a.py", "test_a");
    let kb = similarity_key("tests/test_b.py", "test_b");
    engine.insert_coverage(ka.clone(), record("test_a", "tests/test_a.py", a));
    engine.insert_coverage(kb.clone(), record("test_b", "tests/test_b.py", b));
    let features = engine.features_mut();
    features.insert(
        feature_key("tests/test_a.py", "test_a"),
        TestFeatureSignature {
            mock_assertion_count: mocks.0,
            exception_pattern: exceptions.0.to_string(),
            structural_signature: "func:test_a|params:0".to_string(),
        },
    );
    features.insert(
        feature_key("tests/test_b.py", "test_b"),
        TestFeatureSignature {
            mock_assertion_count: mocks.1,
            exception_pattern: exceptions.1.to_string(),
            structural_signature: "func:test_b|params:0".to_string(),
        },
    );
    (engine, ka, kb)
}

fn lines() -> impl Strategy<Value = BTreeSet<u32>> {
    prop::collection::btree_set(1u32..200, 0..40)
}

fn pattern() -> impl Strategy<Value = String> {
    prop::collection::btree_set(prop::sample::select(vec!["raise_A", "raise_B", "except_C", "pytest_raises"]), 0..4)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>().join("|"))
}

proptest! {
    #[test]
    fn jaccard_is_bounded_and_symmetric(a in lines(), b in lines()) {
        let ab = jaccard(&a, &b);
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert_eq!(ab, jaccard(&b, &a));
    }

    #[test]
    fn jaccard_of_a_set_with_itself_is_one(a in lines()) {
        prop_assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn overall_similarity_is_symmetric_with_one_cache_entry(
        a in lines(),
        b in lines(),
        ma in 0usize..5,
        mb in 0usize..5,
        ea in pattern(),
        eb in pattern(),
    ) {
        let (mut engine, ka, kb) = engine_with(a, b, (ma, mb), (ea.as_str(), eb.as_str()));
        let forward = engine.similarity(&ka, &kb);
        let backward = engine.similarity(&kb, &ka);
        prop_assert_eq!(forward, backward);
        prop_assert_eq!(engine.cache_len(), 1);
        prop_assert!((0.0..=1.0 + 1e-9).contains(&forward));
    }

    #[test]
    fn disjoint_coverage_scores_zero_coverage(n in 1u32..50) {
        let a: BTreeSet<u32> = (1..=n).collect();
        let b: BTreeSet<u32> = (n + 1..=2 * n).collect();
        let (mut engine, ka, kb) = engine_with(a, b, (0, 0), ("", ""));
        prop_assert_eq!(engine.compare(&ka, &kb).coverage, 0.0);
    }
}
