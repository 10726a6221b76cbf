//! `CoverageStore`: JSON-per-record persistence with retention.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use sergeant_core::config::SergeantConfig;
use sergeant_core::errors::StorageError;

use crate::records::{
    CoverageTrends, FileRecord, SessionRecord, SignatureCollection, SignatureRecord,
    SimilarSignature, TestRecord,
};
use crate::retention::{self, RetentionReport};
use crate::sanitize::sanitize_filename;

/// Default minimum score for `find_similar_signatures`.
pub const DEFAULT_SIGNATURE_THRESHOLD: f64 = 0.8;

const SESSIONS_DIR: &str = "sessions";
const TESTS_DIR: &str = "tests";
const FILES_DIR: &str = "files";
const SIGNATURES_DIR: &str = "signatures";
const SIGNATURES_FILE: &str = "signatures.json";

/// File-backed record store. Single writer per process.
#[derive(Debug, Clone)]
pub struct CoverageStore {
    root: PathBuf,
    retention_days: i64,
    enabled: bool,
}

impl CoverageStore {
    /// Open (creating if needed) the store at `root` and enforce retention.
    /// A disabled store touches nothing on disk.
    pub fn open(root: impl Into<PathBuf>, retention_days: i64, enabled: bool) -> Result<Self, StorageError> {
        let store = Self {
            root: root.into(),
            retention_days,
            enabled,
        };
        if !enabled {
            tracing::debug!(root = %store.root.display(), "coverage store disabled");
            return Ok(store);
        }

        for dir in [SESSIONS_DIR, TESTS_DIR, FILES_DIR, SIGNATURES_DIR] {
            let path = store.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| StorageError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
        }

        let report = store.purge_expired();
        tracing::info!(
            root = %store.root.display(),
            retention_days,
            sessions_removed = report.sessions_removed,
            tests_removed = report.tests_removed,
            "coverage store opened"
        );
        Ok(store)
    }

    /// Open the store configured under `[storage]`, relative to `project_root`.
    pub fn from_config(project_root: &Path, config: &SergeantConfig) -> Result<Self, StorageError> {
        let storage = &config.storage;
        Self::open(
            project_root.join(storage.effective_path()),
            storage.effective_retention_days(),
            storage.effective_enabled(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Delete session and test records older than the retention window.
    pub fn purge_expired(&self) -> RetentionReport {
        if !self.enabled {
            return RetentionReport::default();
        }
        retention::enforce(&self.dir(SESSIONS_DIR), &self.dir(TESTS_DIR), self.retention_days)
    }

    // ---- writes ----

    pub fn store_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.record_path(SESSIONS_DIR, &record.session_id);
        write_json(&path, record)?;
        tracing::info!(session_id = %record.session_id, "stored session record");
        Ok(())
    }

    pub fn store_test(&self, record: &TestRecord) -> Result<(), StorageError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.record_path(TESTS_DIR, &record.test_name);
        write_json(&path, record)?;
        tracing::debug!(test = %record.test_name, "stored test record");
        Ok(())
    }

    pub fn store_file(&self, record: &FileRecord) -> Result<(), StorageError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.record_path(FILES_DIR, &record.file_path);
        write_json(&path, record)?;
        tracing::debug!(file = %record.file_path, "stored file record");
        Ok(())
    }

    /// Append to the signature collection. An unreadable collection is left
    /// untouched and reported rather than overwritten.
    pub fn store_signature(&self, record: SignatureRecord) -> Result<(), StorageError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.signatures_path();
        let mut collection: SignatureCollection = read_json(&path)
            .inspect_err(|e| tracing::error!(error = %e, "signature collection unreadable"))?
            .unwrap_or_default();
        let test = record.test_name.clone();
        collection.signatures.push(record);
        write_json(&path, &collection)?;
        tracing::debug!(test = %test, total = collection.signatures.len(), "stored coverage signature");
        Ok(())
    }

    // ---- reads ----

    pub fn load_session(&self, session_id: &str) -> Option<SessionRecord> {
        self.load(&self.record_path(SESSIONS_DIR, session_id))
    }

    pub fn load_test(&self, test_name: &str) -> Option<TestRecord> {
        self.load(&self.record_path(TESTS_DIR, test_name))
    }

    pub fn load_file(&self, file_path: &Path) -> Option<FileRecord> {
        let key = file_path.display().to_string();
        self.load(&self.record_path(FILES_DIR, &key))
    }

    pub fn all_signatures(&self) -> Vec<SignatureRecord> {
        self.load::<SignatureCollection>(&self.signatures_path())
            .map(|c| c.signatures)
            .unwrap_or_default()
    }

    /// Stored signatures whose hash scores at least `threshold` against
    /// `target_hash`, best first.
    pub fn find_similar_signatures(&self, target_hash: &str, threshold: f64) -> Vec<SimilarSignature> {
        let mut similar: Vec<SimilarSignature> = self
            .all_signatures()
            .into_iter()
            .filter_map(|record| {
                let similarity_score = hash_similarity(target_hash, &record.signature_hash);
                (similarity_score >= threshold).then_some(SimilarSignature {
                    record,
                    similarity_score,
                })
            })
            .collect();
        similar.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        similar
    }

    /// Up to `limit` sessions, newest first.
    pub fn recent_sessions(&self, limit: usize) -> Vec<SessionRecord> {
        let mut sessions = self.sessions();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sessions.truncate(limit);
        sessions
    }

    /// Trends over sessions recorded in the last `days` days. `None` when the
    /// window holds no sessions or the store is disabled.
    pub fn coverage_trends(&self, days: i64) -> Option<CoverageTrends> {
        let cutoff = TimeDelta::try_days(days).and_then(|age| Utc::now().checked_sub_signed(age))?;
        let mut window: Vec<SessionRecord> = self
            .sessions()
            .into_iter()
            .filter(|s| s.timestamp >= cutoff)
            .collect();
        window.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        CoverageTrends::from_sessions(days, &window)
    }

    fn sessions(&self) -> Vec<SessionRecord> {
        if !self.enabled {
            return Vec::new();
        }
        let dir = self.dir(SESSIONS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list sessions");
                return Vec::new();
            }
        };
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|path| self.load(&path))
            .collect()
    }

    fn load<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        if !self.enabled {
            return None;
        }
        match read_json(path) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load record");
                None
            }
        }
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn record_path(&self, dir: &str, key: &str) -> PathBuf {
        self.dir(dir).join(format!("{}.json", sanitize_filename(key)))
    }

    fn signatures_path(&self) -> PathBuf {
        self.dir(SIGNATURES_DIR).join(SIGNATURES_FILE)
    }
}

/// Fraction of positions at which two hashes agree, over the longer length.
pub fn hash_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let matching = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    let longest = a.chars().count().max(b.chars().count());
    matching as f64 / longest as f64
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Serialization {
        path: path.to_path_buf(),
        message: e.to_string(),
    });
    let result = json.and_then(|json| {
        fs::write(path, json).map_err(|e| StorageError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    });
    if let Err(e) = &result {
        tracing::error!(error = %e, "failed to write record");
    }
    result
}

/// `Ok(None)` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| StorageError::Serialization {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_similarity_edges() {
        assert_eq!(hash_similarity("abcd", "abcd"), 1.0);
        assert_eq!(hash_similarity("", "abcd"), 0.0);
        assert_eq!(hash_similarity("abcd", ""), 0.0);
        assert_eq!(hash_similarity("abcd", "abXd"), 0.75);
        assert_eq!(hash_similarity("ab", "abcd"), 0.5);
    }

    #[test]
    fn disabled_store_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = CoverageStore::open(&root, 30, false).unwrap();
        store.store_session(&SessionRecord::new("s1")).unwrap();
        assert!(!root.exists());
        assert!(store.load_session("s1").is_none());
        assert!(store.recent_sessions(5).is_empty());
        assert!(store.coverage_trends(7).is_none());
        assert!(store.all_signatures().is_empty());
    }
}
