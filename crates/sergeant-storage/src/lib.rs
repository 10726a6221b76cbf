//! sergeant-storage: JSON-per-record persistence for drill-sergeant runs.
//!
//! Layout under the store root:
//! - `sessions/<session_id>.json`
//! - `tests/<test_name>.json`
//! - `files/<file_path>.json`
//! - `signatures/signatures.json` (append-only collection)
//!
//! Every read and write is guarded individually. A disabled store accepts
//! every call and persists nothing.

pub mod records;
pub mod retention;
pub mod sanitize;
pub mod store;

pub use records::{
    CoverageTrends, FileRecord, SessionRecord, SignatureCollection, SignatureRecord,
    SimilarSignature, TestRecord, TestScore, Trend,
};
pub use retention::RetentionReport;
pub use sanitize::sanitize_filename;
pub use store::{hash_similarity, CoverageStore, DEFAULT_SIGNATURE_THRESHOLD};
