//! Source file resolution: which project files a test plausibly exercises.
//!
//! Candidates come from the test file itself (when it defines helpers), the
//! sibling `src/` and `lib/` trees, and packages found walking up from the
//! test directory. Imports of the test file then narrow the selection.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use sergeant_core::errors::ResolutionError;
use sergeant_core::types::collections::FxHashSet;
use walkdir::WalkDir;

use crate::parsers::PythonParser;

/// Limits applied during discovery and selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub max_parent_depth: usize,
    pub max_selected_files: usize,
    pub max_candidate_files: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_parent_depth: 5,
            max_selected_files: 20,
            max_candidate_files: 50,
        }
    }
}

/// Directories discovery never walks into or past.
const SYSTEM_DIRS: &[&str] = &[
    "/", "/usr", "/var", "/etc", "/bin", "/sbin", "/lib", "/lib64", "/opt", "/home", "/root",
    "/tmp", "/sys", "/proc", "/dev",
    r"C:\", r"C:\Windows", r"C:\Program Files", r"C:\Program Files (x86)", r"C:\System32",
    r"C:\Users", r"C:\ProgramData",
];

/// Standard library and test infrastructure modules never treated as
/// project imports.
static STDLIB_MODULES: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "os", "sys", "json", "datetime", "time", "random", "math", "collections", "itertools",
        "functools", "operator", "string", "re", "urllib", "http", "socket", "threading",
        "multiprocessing", "subprocess", "logging", "unittest", "pytest", "pathlib", "typing",
        "dataclasses", "enum", "abc", "contextlib", "copy", "pickle", "hashlib", "base64", "uuid",
        "tempfile", "shutil", "glob", "fnmatch", "stat", "fileinput", "linecache", "codecs",
        "locale", "gettext", "argparse", "configparser", "csv", "xml", "html", "email",
        "mimetypes", "platform", "ctypes", "warnings", "traceback", "inspect", "ast", "tokenize",
        "keyword", "builtins", "io", "textwrap", "unicodedata", "codeop", "py_compile",
        "compileall", "dis", "pickletools", "distutils", "setuptools",
    ]
    .into_iter()
    .collect()
});

const INFRASTRUCTURE_PREFIXES: &[&str] = &["_", "test", "tests", "conftest"];

static TEST_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^test|_test\.py$").expect("valid test-file pattern"));

/// True for modules that belong to the standard library or test tooling.
pub fn is_stdlib_module(module: &str) -> bool {
    let top = module.split('.').next().unwrap_or(module);
    STDLIB_MODULES.contains(top)
        || INFRASTRUCTURE_PREFIXES
            .iter()
            .any(|prefix| module.starts_with(prefix))
}

/// True for test files: `test*` names, `*_test.py`, or a `test`/`tests`
/// directory component.
pub fn is_test_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if TEST_FILE_NAME.is_match(&name) {
        return true;
    }
    path.parent().is_some_and(|parent| {
        parent
            .components()
            .any(|c| matches!(c.as_os_str().to_str(), Some("test" | "tests")))
    })
}

fn is_system_dir(path: &Path) -> bool {
    let s = path.to_string_lossy();
    SYSTEM_DIRS.iter().any(|d| *d == s)
}

/// Resolve an imported module name to one of `candidates`: by file stem,
/// by package `__init__.py`, or by a dotted path matching the file's tail.
pub fn resolve_import<'a>(module: &str, candidates: &'a [PathBuf]) -> Option<&'a PathBuf> {
    let module = module.trim_start_matches('.');
    if module.is_empty() {
        return None;
    }
    let parts: Vec<&str> = module.split('.').collect();
    candidates.iter().find(|candidate| {
        let stem = candidate.file_stem().and_then(|s| s.to_str());
        let name = candidate.file_name().and_then(|s| s.to_str());
        let parent_name = candidate
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str());

        if stem == Some(module) {
            return true;
        }
        if parent_name == Some(module) && name == Some("__init__.py") {
            return true;
        }
        parts.len() > 1 && module_path_matches(candidate, &parts)
    })
}

/// `pkg.mod` matches `.../pkg/mod.py` and `.../pkg/mod/__init__.py`.
fn module_path_matches(candidate: &Path, parts: &[&str]) -> bool {
    let mut tail: Vec<String> = candidate
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if tail.last().map(String::as_str) == Some("__init__.py") {
        tail.pop();
    } else if let Some(last) = tail.last_mut() {
        if let Some(stem) = last.strip_suffix(".py") {
            *last = stem.to_string();
        }
    }
    tail.len() >= parts.len()
        && tail[tail.len() - parts.len()..]
            .iter()
            .zip(parts)
            .all(|(a, b)| a == b)
}

/// Discovers and selects the source files measured for a test.
pub struct SourceResolver {
    config: ResolverConfig,
    parser: Option<PythonParser>,
}

impl SourceResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let parser = match PythonParser::new() {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %e, "python grammar unavailable, import analysis disabled");
                None
            }
        };
        Self { config, parser }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Source files for `test_file`. Never fails: any error in the
    /// import-aware path falls back to plain discovery.
    pub fn resolve(&mut self, test_file: &Path) -> Vec<PathBuf> {
        match self.resolve_with_imports(test_file) {
            Ok(files) => {
                tracing::debug!(
                    test_file = %test_file.display(),
                    count = files.len(),
                    "resolved source files"
                );
                files
            }
            Err(e) => {
                tracing::warn!(
                    test_file = %test_file.display(),
                    error = %e,
                    "source resolution failed, using directory discovery"
                );
                self.discover_candidates(test_file)
            }
        }
    }

    fn resolve_with_imports(&mut self, test_file: &Path) -> Result<Vec<PathBuf>, ResolutionError> {
        let parser = self
            .parser
            .as_mut()
            .ok_or_else(|| ResolutionError::ImportAnalysis {
                path: test_file.to_path_buf(),
                message: "python grammar unavailable".to_string(),
            })?;
        let module = parser
            .parse_file(test_file)
            .map_err(|e| ResolutionError::ImportAnalysis {
                path: test_file.to_path_buf(),
                message: e.to_string(),
            })?;

        let includes_self = module.defines_non_test_functions();
        let imported: Vec<String> = module
            .imported_modules()
            .into_iter()
            .filter(|m| !is_stdlib_module(m))
            .collect();
        drop(module);

        let candidates = self.discover_candidates(test_file);

        let mut imported_files: Vec<PathBuf> = Vec::new();
        for module_name in &imported {
            if let Some(file) = resolve_import(module_name, &candidates) {
                if !imported_files.contains(file) {
                    imported_files.push(file.clone());
                }
            }
        }

        let lead = includes_self.then_some(test_file);
        Ok(self.select(candidates, imported_files, lead))
    }

    /// `lead` (the test file, when it carries helpers), then imported files
    /// and their non-test siblings; or the first candidates when no import
    /// resolved. Caps apply to the whole selection.
    fn select(
        &self,
        candidates: Vec<PathBuf>,
        imported_files: Vec<PathBuf>,
        lead: Option<&Path>,
    ) -> Vec<PathBuf> {
        let mut selected: Vec<PathBuf> = lead.map(Path::to_path_buf).into_iter().collect();

        if imported_files.is_empty() {
            for file in candidates {
                if !selected.contains(&file) {
                    selected.push(file);
                }
            }
            selected.truncate(self.config.max_candidate_files);
            tracing::debug!(count = selected.len(), "no imports resolved, using candidates");
            return selected;
        }

        for file in &imported_files {
            if !selected.contains(file) {
                selected.push(file.clone());
            }
        }
        for imported in &imported_files {
            let Some(package_dir) = imported.parent() else {
                continue;
            };
            for file in python_files_under(package_dir) {
                if !selected.contains(&file) && !is_test_file(&file) {
                    selected.push(file);
                }
            }
        }
        selected.truncate(self.config.max_selected_files);
        tracing::debug!(count = selected.len(), "selected files from import analysis");
        selected
    }

    /// `src/` and `lib/` beside the test directory, then packages in safe
    /// parent directories; test files removed, duplicates dropped.
    pub fn discover_candidates(&self, test_file: &Path) -> Vec<PathBuf> {
        let Some(test_dir) = test_file.parent() else {
            return Vec::new();
        };
        let mut found: Vec<PathBuf> = Vec::new();

        if let Some(project_dir) = test_dir.parent() {
            for conventional in ["src", "lib"] {
                let dir = project_dir.join(conventional);
                if dir.is_dir() {
                    found.extend(python_files_under(&dir));
                }
            }
        }

        for parent in self.safe_parents(test_dir) {
            let entries = match std::fs::read_dir(&parent) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!(dir = %parent.display(), error = %e, "skipping unreadable parent");
                    continue;
                }
            };
            let mut packages: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_dir())
                .filter(|path| {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    !name.starts_with("test") && name != "tests"
                })
                .filter(|path| path.join("__init__.py").is_file())
                .collect();
            packages.sort();
            for package in packages {
                found.extend(python_files_under(&package));
            }
        }

        let mut seen = FxHashSet::default();
        found
            .into_iter()
            .filter(|p| !is_test_file(p))
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    /// Parents of `start` (exclusive), stopping at system directories, at
    /// the first unreadable directory, or after `max_parent_depth` entries.
    pub fn safe_parents(&self, start: &Path) -> Vec<PathBuf> {
        let mut parents = Vec::new();
        for parent in start.ancestors().skip(1) {
            if parent.as_os_str().is_empty() {
                break;
            }
            if is_system_dir(parent) {
                tracing::debug!(dir = %parent.display(), "stopping at system directory");
                break;
            }
            if let Err(e) = std::fs::read_dir(parent) {
                tracing::debug!(dir = %parent.display(), error = %e, "cannot access parent directory");
                break;
            }
            parents.push(parent.to_path_buf());
            if parents.len() >= self.config.max_parent_depth {
                break;
            }
        }
        parents
    }
}

/// Every `*.py` file under `dir`, sorted, unreadable branches skipped.
pub fn python_files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "py"))
        .collect()
}

/// Directories a test needs on the interpreter's import path: the first
/// non-package ancestor of the test file and of every source, then the
/// test directory's parent.
pub fn import_roots(test_file: &Path, sources: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    let files = std::iter::once(test_file).chain(sources.iter().map(PathBuf::as_path));
    for root in files.filter_map(package_root) {
        push_unique(&mut roots, root);
    }
    if let Some(project_dir) = test_file.parent().and_then(Path::parent) {
        if !project_dir.as_os_str().is_empty() {
            push_unique(&mut roots, project_dir.to_path_buf());
        }
    }
    roots
}

/// Walk up from `file` while the directory is a package (`__init__.py`).
fn package_root(file: &Path) -> Option<PathBuf> {
    let mut dir = file.parent()?;
    while dir.join("__init__.py").is_file() {
        match dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => dir = parent,
            _ => break,
        }
    }
    (!dir.as_os_str().is_empty()).then(|| dir.to_path_buf())
}

fn push_unique(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}
