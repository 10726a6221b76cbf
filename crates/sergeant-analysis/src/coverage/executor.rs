//! Executing a single test under line and branch instrumentation.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use sergeant_core::errors::InstrumentationError;
use sergeant_core::types::collections::FxHashMap;
use tempfile::TempDir;

const HARNESS_SOURCE: &str = include_str!("harness.py");
const HARNESS_FILE: &str = "drill_sergeant_harness.py";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One test to run, with the files coverage is restricted to.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub test_file: &'a Path,
    pub test_name: &'a str,
    pub sources: &'a [PathBuf],
    /// Prepended to the interpreter's import path before the test loads.
    pub import_roots: &'a [PathBuf],
}

/// Line data for one measured file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileCoverage {
    pub executable: BTreeSet<u32>,
    pub executed: BTreeSet<u32>,
    #[serde(default)]
    pub arcs: usize,
}

/// Raw line-hit data for a single test execution, keyed by measured path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCoverage {
    pub files: FxHashMap<String, FileCoverage>,
    #[serde(default)]
    pub test_found: bool,
    /// The test ran but raised; its coverage is still usable.
    #[serde(default)]
    pub test_error: Option<String>,
    /// The test module itself failed to import.
    #[serde(default)]
    pub load_error: Option<String>,
}

impl RawCoverage {
    /// Number of executed lines across every measured file.
    pub fn executed_line_count(&self) -> usize {
        self.files.values().map(|f| f.executed.len()).sum()
    }
}

/// Runs one test under coverage and returns raw line-hit data.
pub trait TestExecutor {
    /// Prepare a fresh coverage session (data directory, harness).
    fn start_session(&mut self) -> Result<(), InstrumentationError>;

    fn has_session(&self) -> bool;

    /// Tear down the current session. Safe to call without one.
    fn end_session(&mut self);

    fn execute(&mut self, request: &ExecutionRequest<'_>) -> Result<RawCoverage, InstrumentationError>;
}

/// Executes tests in a `python` subprocess driving coverage.py.
///
/// Each session owns a temporary directory holding the harness script and
/// one coverage data file per execution; dropping the session removes it.
pub struct PythonCoverageExecutor {
    python: String,
    timeout: Duration,
    working_dir: Option<PathBuf>,
    session: Option<TempDir>,
    runs: u64,
}

impl PythonCoverageExecutor {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
            working_dir: None,
            session: None,
            runs: 0,
        }
    }

    /// Run the interpreter from `dir` (usually the project root).
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn session_dir(&self) -> Option<&Path> {
        self.session.as_ref().map(TempDir::path)
    }

    fn wait_with_timeout(
        &self,
        child: &mut std::process::Child,
        test_name: &str,
    ) -> Result<std::process::ExitStatus, InstrumentationError> {
        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    return Err(InstrumentationError::HarnessFailed {
                        test_name: test_name.to_string(),
                        message: e.to_string(),
                    })
                }
            }
            if start.elapsed() > self.timeout {
                if let Err(e) = child.kill() {
                    tracing::warn!(error = %e, test_name, "failed to kill timed out test");
                }
                let _ = child.wait();
                return Err(InstrumentationError::Timeout {
                    test_name: test_name.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TestExecutor for PythonCoverageExecutor {
    fn start_session(&mut self) -> Result<(), InstrumentationError> {
        let dir = tempfile::Builder::new()
            .prefix("drill_sergeant_coverage_")
            .tempdir()
            .map_err(|e| InstrumentationError::SessionStart {
                message: e.to_string(),
            })?;
        std::fs::write(dir.path().join(HARNESS_FILE), HARNESS_SOURCE).map_err(|e| {
            InstrumentationError::SessionStart {
                message: e.to_string(),
            }
        })?;
        tracing::debug!(dir = %dir.path().display(), "coverage session started");
        self.session = Some(dir);
        self.runs = 0;
        Ok(())
    }

    fn has_session(&self) -> bool {
        self.session.as_ref().is_some_and(|d| d.path().is_dir())
    }

    fn end_session(&mut self) {
        if let Some(dir) = self.session.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(dir = %path.display(), error = %e, "failed to remove coverage session");
            } else {
                tracing::debug!(dir = %path.display(), "coverage session stopped");
            }
        }
    }

    fn execute(&mut self, request: &ExecutionRequest<'_>) -> Result<RawCoverage, InstrumentationError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| InstrumentationError::SessionStart {
                message: "no active coverage session".to_string(),
            })?
            .path()
            .to_path_buf();
        self.runs += 1;
        let data_file = session.join(format!("coverage-{}.dat", self.runs));
        let out_file = session.join(format!("coverage-{}.json", self.runs));
        let err_file = session.join(format!("coverage-{}.stderr", self.runs));

        let stderr = File::create(&err_file).map_err(|e| InstrumentationError::SessionStart {
            message: e.to_string(),
        })?;

        let roots = std::env::join_paths(request.import_roots).map_err(|e| {
            InstrumentationError::HarnessFailed {
                test_name: request.test_name.to_string(),
                message: format!("invalid import root: {e}"),
            }
        })?;

        let mut command = Command::new(&self.python);
        command
            .arg(session.join(HARNESS_FILE))
            .arg(&data_file)
            .arg(&out_file)
            .arg(request.test_file)
            .arg(request.test_name)
            .arg(&roots)
            .args(request.sources)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr));
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| InstrumentationError::Spawn {
            program: self.python.clone(),
            message: e.to_string(),
        })?;
        let status = self.wait_with_timeout(&mut child, request.test_name)?;

        if !status.success() {
            let detail = std::fs::read_to_string(&err_file).unwrap_or_default();
            let last_line = detail.lines().last().unwrap_or("").trim().to_string();
            return Err(InstrumentationError::HarnessFailed {
                test_name: request.test_name.to_string(),
                message: format!("exit status {status}: {last_line}"),
            });
        }

        let output = std::fs::read_to_string(&out_file).map_err(|e| {
            InstrumentationError::MalformedOutput {
                message: format!("{}: {e}", out_file.display()),
            }
        })?;
        let raw: RawCoverage =
            serde_json::from_str(&output).map_err(|e| InstrumentationError::MalformedOutput {
                message: e.to_string(),
            })?;

        if let Some(err) = &raw.load_error {
            if raw.executed_line_count() == 0 {
                return Err(InstrumentationError::TestLoad {
                    test_name: request.test_name.to_string(),
                    message: err.clone(),
                });
            }
            tracing::warn!(test_name = request.test_name, error = %err, "test module failed to load");
        }
        if let Some(err) = &raw.test_error {
            tracing::debug!(test_name = request.test_name, error = %err, "test raised under coverage");
        }
        if !raw.test_found {
            tracing::warn!(
                test_name = request.test_name,
                test_file = %request.test_file.display(),
                "test function not found at runtime"
            );
        }
        Ok(raw)
    }
}

impl Drop for PythonCoverageExecutor {
    fn drop(&mut self) {
        self.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_coverage_decodes_harness_output() {
        let json = r#"{
            "files": {"/p/app.py": {"executable": [1, 2, 3], "executed": [1, 3], "arcs": 4}},
            "test_found": true,
            "test_error": null,
            "load_error": null
        }"#;
        let raw: RawCoverage = serde_json::from_str(json).unwrap();
        let file = &raw.files["/p/app.py"];
        assert_eq!(file.executed.len(), 2);
        assert_eq!(file.arcs, 4);
        assert!(raw.test_found);
        assert!(raw.load_error.is_none());
        assert_eq!(raw.executed_line_count(), 2);
    }

    #[test]
    fn session_lifecycle_creates_and_removes_directory() {
        let mut exec = PythonCoverageExecutor::new("python3", Duration::from_secs(1));
        assert!(!exec.has_session());
        exec.start_session().unwrap();
        let dir = exec.session_dir().unwrap().to_path_buf();
        assert!(dir.join(HARNESS_FILE).is_file());
        exec.end_session();
        assert!(!exec.has_session());
        assert!(!dir.exists());
    }

    #[test]
    fn execute_without_session_is_an_error() {
        let mut exec = PythonCoverageExecutor::new("python3", Duration::from_secs(1));
        let sources: Vec<PathBuf> = Vec::new();
        let request = ExecutionRequest {
            test_file: Path::new("tests/test_x.py"),
            test_name: "test_x",
            sources: &sources,
            import_roots: &sources,
        };
        assert!(matches!(
            exec.execute(&request),
            Err(InstrumentationError::SessionStart { .. })
        ));
    }

    #[test]
    fn missing_interpreter_is_a_spawn_error() {
        let mut exec = PythonCoverageExecutor::new(
            "definitely-not-a-python-interpreter",
            Duration::from_secs(1),
        );
        exec.start_session().unwrap();
        let sources: Vec<PathBuf> = Vec::new();
        let request = ExecutionRequest {
            test_file: Path::new("tests/test_x.py"),
            test_name: "test_x",
            sources: &sources,
            import_roots: &sources,
        };
        assert!(matches!(
            exec.execute(&request),
            Err(InstrumentationError::Spawn { .. })
        ));
    }

    /// An interpreter stand-in that writes a canned harness report.
    #[cfg(unix)]
    fn canned_interpreter(dir: &Path, report: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-python");
        std::fs::write(&path, format!("#!/bin/sh\ncat > \"$3\" <<'EOF'\n{report}\nEOF\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn load_failure_without_measured_lines_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let python = canned_interpreter(
            dir.path(),
            r#"{"files": {}, "test_found": false, "load_error": "ModuleNotFoundError: No module named 'mypkg'"}"#,
        );
        let mut exec = PythonCoverageExecutor::new(python.display().to_string(), Duration::from_secs(5));
        exec.start_session().unwrap();
        let sources: Vec<PathBuf> = Vec::new();
        let roots = vec![dir.path().to_path_buf()];
        let request = ExecutionRequest {
            test_file: Path::new("tests/test_x.py"),
            test_name: "test_x",
            sources: &sources,
            import_roots: &roots,
        };
        assert!(matches!(
            exec.execute(&request),
            Err(InstrumentationError::TestLoad { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn load_failure_after_measuring_lines_keeps_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let python = canned_interpreter(
            dir.path(),
            r#"{"files": {"/p/app.py": {"executable": [1, 2], "executed": [1]}}, "load_error": "ImportError: late"}"#,
        );
        let mut exec = PythonCoverageExecutor::new(python.display().to_string(), Duration::from_secs(5));
        exec.start_session().unwrap();
        let sources: Vec<PathBuf> = Vec::new();
        let request = ExecutionRequest {
            test_file: Path::new("tests/test_x.py"),
            test_name: "test_x",
            sources: &sources,
            import_roots: &sources,
        };
        let raw = exec.execute(&request).unwrap();
        assert_eq!(raw.executed_line_count(), 1);
    }
}
