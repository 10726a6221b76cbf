//! Age-based cleanup of session and test records.

use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};

/// What one retention pass deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub sessions_removed: usize,
    pub tests_removed: usize,
}

impl RetentionReport {
    pub fn total(&self) -> usize {
        self.sessions_removed + self.tests_removed
    }
}

/// Delete `*.json` files under `sessions_dir` and `tests_dir` whose mtime is
/// older than `retention_days`. A non-positive retention disables cleanup.
pub fn enforce(sessions_dir: &Path, tests_dir: &Path, retention_days: i64) -> RetentionReport {
    if retention_days <= 0 {
        return RetentionReport::default();
    }
    let Some(cutoff) = TimeDelta::try_days(retention_days).and_then(|age| Utc::now().checked_sub_signed(age)) else {
        return RetentionReport::default();
    };
    RetentionReport {
        sessions_removed: remove_older_than(sessions_dir, cutoff),
        tests_removed: remove_older_than(tests_dir, cutoff),
    }
}

fn remove_older_than(dir: &Path, cutoff: DateTime<Utc>) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "retention scan failed");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read mtime");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed expired record");
                removed += 1;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove expired record"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = dir.path().join("sessions");
        let tests = dir.path().join("tests");
        fs::create_dir_all(&sessions).unwrap();
        fs::create_dir_all(&tests).unwrap();
        fs::write(sessions.join("s1.json"), "{}").unwrap();
        fs::write(tests.join("test_a.json"), "{}").unwrap();

        let report = enforce(&sessions, &tests, 30);
        assert_eq!(report.total(), 0);
        assert!(sessions.join("s1.json").exists());
    }

    #[test]
    fn non_positive_retention_skips_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(enforce(dir.path(), dir.path(), 0), RetentionReport::default());
        assert_eq!(enforce(dir.path(), dir.path(), -3), RetentionReport::default());
    }

    #[test]
    fn missing_directories_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let report = enforce(&dir.path().join("nope"), &dir.path().join("nada"), 1);
        assert_eq!(report.total(), 0);
    }
}
