//! Per-test coverage collection: resolve sources, analyze, execute, extract.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sergeant_core::config::SergeantConfig;
use sergeant_core::errors::{AnalysisError, PipelineError};
use sergeant_core::types::collections::{FxHashMap, FxHashSet};
use xxhash_rust::xxh3::xxh3_64;

use super::executor::{
    ExecutionRequest, FileCoverage, PythonCoverageExecutor, RawCoverage, TestExecutor,
};
use super::insights::{analysis_insights, TestDiagnostics};
use super::resolver::{import_roots, ResolverConfig, SourceResolver};
use super::types::{BranchCounts, CoverageRecord};
use crate::keys::{feature_key, similarity_key};
use crate::parsers::PythonParser;

/// Resolved settings for an extractor backed by a Python interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub python: String,
    pub timeout: Duration,
    pub resolver: ResolverConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            timeout: Duration::from_secs(60),
            resolver: ResolverConfig::default(),
        }
    }
}

impl From<&SergeantConfig> for ExtractorConfig {
    fn from(config: &SergeantConfig) -> Self {
        let c = &config.coverage;
        Self {
            python: c.effective_python().to_string(),
            timeout: Duration::from_secs(c.effective_timeout_secs()),
            resolver: ResolverConfig {
                max_parent_depth: c.effective_max_parent_depth(),
                max_selected_files: c.effective_max_selected_files(),
                max_candidate_files: c.effective_max_candidate_files(),
            },
        }
    }
}

impl CoverageExtractor<PythonCoverageExecutor> {
    pub fn from_config(config: &ExtractorConfig) -> Self {
        let executor = PythonCoverageExecutor::new(config.python.clone(), config.timeout);
        Self::new(executor, config.resolver.clone())
    }
}

/// Collects a [`CoverageRecord`] per test through a [`TestExecutor`].
pub struct CoverageExtractor<E: TestExecutor> {
    executor: E,
    resolver: SourceResolver,
    parser: Option<PythonParser>,
    records: FxHashMap<String, CoverageRecord>,
    diagnostics: FxHashMap<String, TestDiagnostics>,
    imported_files: FxHashSet<PathBuf>,
    called_functions: FxHashSet<String>,
}

impl<E: TestExecutor> CoverageExtractor<E> {
    pub fn new(executor: E, config: ResolverConfig) -> Self {
        let parser = match PythonParser::new() {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %e, "python grammar unavailable, test analysis disabled");
                None
            }
        };
        Self {
            executor,
            resolver: SourceResolver::new(config),
            parser,
            records: FxHashMap::default(),
            diagnostics: FxHashMap::default(),
            imported_files: FxHashSet::default(),
            called_functions: FxHashSet::default(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Coverage for one test. Never fails: any error yields the zeroed
    /// record for the test, which is still stored.
    pub fn collect(
        &mut self,
        test_file: &Path,
        test_name: &str,
        line_number: u32,
        source_files: Option<&[PathBuf]>,
    ) -> CoverageRecord {
        let record = match self.try_collect(test_file, test_name, line_number, source_files) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(
                    test_name,
                    test_file = %test_file.display(),
                    error = %e,
                    "failed to collect coverage"
                );
                CoverageRecord::empty(test_name, test_file, line_number)
            }
        };
        self.records.insert(
            feature_key(&test_file.display().to_string(), test_name),
            record.clone(),
        );
        record
    }

    fn try_collect(
        &mut self,
        test_file: &Path,
        test_name: &str,
        line_number: u32,
        source_files: Option<&[PathBuf]>,
    ) -> Result<CoverageRecord, PipelineError> {
        let sources: Vec<PathBuf> = match source_files {
            Some(files) => files.to_vec(),
            None => self.resolver.resolve(test_file),
        };

        if !self.executor.has_session() {
            self.executor.start_session()?;
        }

        let raw = match self.analyze_test(test_file, test_name, &sources) {
            Ok(()) => {
                let roots = import_roots(test_file, &sources);
                let request = ExecutionRequest {
                    test_file,
                    test_name,
                    sources: &sources,
                    import_roots: &roots,
                };
                self.executor.execute(&request)?
            }
            Err(e) => {
                tracing::warn!(test_name, error = %e, "test not analyzed, skipping execution");
                RawCoverage::default()
            }
        };

        let base = extract(&raw, test_file, test_name, line_number, &sources);
        let key = feature_key(&test_file.display().to_string(), test_name);
        let insights = analysis_insights(self.diagnostics.get(&key), sources.len());
        tracing::debug!(test_name, insights = %insights, "analysis insights");
        let signature = format!(
            "{}|analysis:{insights}",
            base.coverage_signature().unwrap_or_default()
        );
        Ok(base.with_signature(signature))
    }

    /// Parse the test file, find the function, record its diagnostics.
    fn analyze_test(
        &mut self,
        test_file: &Path,
        test_name: &str,
        sources: &[PathBuf],
    ) -> Result<(), AnalysisError> {
        let parser = self
            .parser
            .as_mut()
            .ok_or_else(|| AnalysisError::TestNotFound {
                file: test_file.display().to_string(),
                test_name: test_name.to_string(),
            })?;
        let module = parser.parse_file(test_file)?;
        let function = module
            .find_function(test_name)
            .ok_or_else(|| AnalysisError::TestNotFound {
                file: test_file.display().to_string(),
                test_name: test_name.to_string(),
            })?;

        let diagnostics = TestDiagnostics::analyze(&function, sources);
        if let Ok(imports) = &diagnostics.imports {
            self.imported_files
                .extend(imports.imported_files.iter().cloned());
        }
        if let Ok(calls) = &diagnostics.calls {
            self.called_functions
                .extend(calls.called_functions.iter().cloned());
        }
        self.diagnostics.insert(
            feature_key(&test_file.display().to_string(), test_name),
            diagnostics,
        );
        Ok(())
    }

    /// Run [`CoverageExtractor::collect`] for every `test_*` function in
    /// `files`, keyed by `"<test>::<file>"`.
    pub fn collect_suite(&mut self, files: &[PathBuf]) -> FxHashMap<String, CoverageRecord> {
        let mut table = FxHashMap::default();
        for file in files {
            let tests: Vec<(String, u32)> = match self.parser.as_mut().map(|p| p.parse_file(file)) {
                Some(Ok(module)) => {
                    let functions = module.test_functions();
                    let tests = functions
                        .iter()
                        .map(|f| (f.name().to_string(), f.line()))
                        .collect();
                    tests
                }
                Some(Err(e)) => {
                    tracing::warn!(file = %file.display(), error = %e, "skipping unparseable test file");
                    continue;
                }
                None => continue,
            };
            for (test_name, line) in tests {
                let record = self.collect(file, &test_name, line, None);
                table.insert(similarity_key(&file.display().to_string(), &test_name), record);
            }
        }
        table
    }

    pub fn record(&self, test_file: &Path, test_name: &str) -> Option<&CoverageRecord> {
        self.records
            .get(&feature_key(&test_file.display().to_string(), test_name))
    }

    /// The stored record, only if its signature carries analysis insights.
    pub fn enhanced_record(&self, test_file: &Path, test_name: &str) -> Option<&CoverageRecord> {
        self.record(test_file, test_name)
            .filter(|r| r.coverage_signature().is_some_and(|s| s.contains("analysis:")))
    }

    pub fn diagnostics(&self, test_file: &Path, test_name: &str) -> Option<&TestDiagnostics> {
        self.diagnostics
            .get(&feature_key(&test_file.display().to_string(), test_name))
    }

    /// Coverage metrics, diagnostics and signature of a collected test.
    pub fn summary(&self, test_file: &Path, test_name: &str) -> Option<serde_json::Value> {
        let record = self.record(test_file, test_name)?;
        let analysis = self
            .diagnostics(test_file, test_name)
            .map(TestDiagnostics::to_json)
            .unwrap_or_else(|| serde_json::json!({"imports": null, "calls": null}));
        Some(serde_json::json!({
            "test_name": test_name,
            "file_path": test_file.display().to_string(),
            "coverage": {
                "percentage": record.coverage_percentage(),
                "lines_covered": record.lines_covered(),
                "lines_total": record.lines_total(),
                "branches_covered": record.branches_covered(),
                "branches_total": record.branches_total(),
            },
            "analysis": analysis,
            "signature": record.coverage_signature(),
        }))
    }

    /// Union of files imported by every analyzed test.
    pub fn imported_files(&self) -> &FxHashSet<PathBuf> {
        &self.imported_files
    }

    /// Union of call targets across every analyzed test.
    pub fn called_functions(&self) -> &FxHashSet<String> {
        &self.called_functions
    }

    pub fn clear_analysis_results(&mut self) {
        self.imported_files.clear();
        self.called_functions.clear();
        self.diagnostics.clear();
    }

    /// End the coverage session; the next collection starts a new one.
    pub fn shutdown(&mut self) {
        self.executor.end_session();
    }
}

/// Measured data for `source`, by its path as given or canonicalized.
fn lookup<'a>(raw: &'a RawCoverage, source: &Path) -> Option<&'a FileCoverage> {
    raw.files.get(&source.display().to_string()).or_else(|| {
        std::fs::canonicalize(source)
            .ok()
            .and_then(|canonical| raw.files.get(&canonical.display().to_string()))
    })
}

/// Fold raw per-file data for `sources` into a single record.
///
/// Line totals count executable lines. Any recorded arc counts as a covered
/// branch.
pub fn extract(
    raw: &RawCoverage,
    test_file: &Path,
    test_name: &str,
    line_number: u32,
    sources: &[PathBuf],
) -> CoverageRecord {
    let mut covered_lines = BTreeSet::new();
    let mut missing_lines = BTreeSet::new();
    let mut branches = BranchCounts::default();
    let mut signature_parts: Vec<String> = Vec::new();

    for source in sources {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(file) = lookup(raw, source) else {
            tracing::debug!(source = %source.display(), "source not measured");
            signature_parts.push(format!("{name}:0"));
            continue;
        };
        let executed: BTreeSet<u32> = file.executable.intersection(&file.executed).copied().collect();
        missing_lines.extend(file.executable.difference(&file.executed).copied());
        signature_parts.push(format!("{name}:{}", executed.len()));
        covered_lines.extend(executed);
        branches.total += file.arcs;
        branches.covered += file.arcs;
    }

    if !covered_lines.is_empty() {
        signature_parts.push(format!("coverage:{}", line_hash(&covered_lines)));
    }

    CoverageRecord::from_lines(
        test_name,
        test_file,
        line_number,
        covered_lines,
        missing_lines,
        branches,
        Some(signature_parts.join("|")),
    )
}

/// 8 hex chars identifying a covered-line set.
pub fn line_hash(lines: &BTreeSet<u32>) -> String {
    let joined = lines
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let full = format!("{:016x}", xxh3_64(joined.as_bytes()));
    full[..8].to_string()
}
