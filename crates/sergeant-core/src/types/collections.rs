//! Re-exports of performance-oriented collection types.

pub use rustc_hash::{FxHashMap, FxHashSet};
pub use smallvec::SmallVec;
pub use std::collections::{BTreeMap, BTreeSet};

/// SmallVec for signature tokens (usually <8).
pub type SmallVec8<T> = SmallVec<[T; 8]>;
