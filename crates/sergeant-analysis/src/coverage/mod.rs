//! Coverage collection: source resolution, instrumented execution, records,
//! diagnostics and fingerprints.

pub mod executor;
pub mod extractor;
pub mod fingerprint;
pub mod insights;
pub mod resolver;
pub mod types;

pub use executor::{ExecutionRequest, FileCoverage, PythonCoverageExecutor, RawCoverage, TestExecutor};
pub use extractor::{CoverageExtractor, ExtractorConfig};
pub use fingerprint::{CoverageFingerprint, FingerprintIndex};
pub use insights::{CallAnalysis, ImportAnalysis, TestDiagnostics};
pub use resolver::{ResolverConfig, SourceResolver};
pub use types::{BranchCounts, CoverageRecord};
