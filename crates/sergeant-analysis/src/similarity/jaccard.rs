//! Jaccard similarity over line sets and pipe-delimited token strings.

use std::collections::BTreeSet;
use std::hash::Hash;

use sergeant_core::types::collections::FxHashSet;

/// J(A, B) = |A ∩ B| / |A ∪ B|, with both-empty scoring 1.0 and exactly
/// one empty side scoring 0.0.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Same rules as [`jaccard`] for hash sets.
pub fn jaccard_hashed<T: Eq + Hash>(a: &FxHashSet<T>, b: &FxHashSet<T>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Non-empty `|`-separated tokens of `s`.
pub fn token_set(s: &str) -> FxHashSet<&str> {
    s.split('|').filter(|t| !t.is_empty()).collect()
}

/// Jaccard over the token sets of two pipe-joined strings.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    jaccard_hashed(&token_set(a), &token_set(b))
}
