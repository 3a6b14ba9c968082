use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Session-wide integer key/value storage.
///
/// Writes must be visible to the next `get` immediately; whether they
/// have reached disk is only guaranteed after `flush` returns `Ok`.
pub trait KeyValueStore {
    /// Returns the stored value, or `default` without recording it.
    fn get(&self, key: &str, default: i64) -> i64;

    fn set(&mut self, key: &str, value: i64);

    fn keys(&self) -> Vec<String>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    values: BTreeMap<String, i64>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryState {
    fn get(&self, key: &str, default: i64) -> i64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    fn set(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), value);
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

// On-disk layout of the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateSnapshot {
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    values: BTreeMap<String, i64>,
}

/// JSON-file backed store. Values are held in memory and written out by
/// `flush`.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    snapshot: StateSnapshot,
    dirty: bool,
}

impl StateFile {
    /// Opens the state at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateSnapshot::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = snapshot.values.len(), "state file opened");
        Ok(StateFile {
            path,
            snapshot,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.saved_at
    }
}

impl KeyValueStore for StateFile {
    fn get(&self, key: &str, default: i64) -> i64 {
        self.snapshot.values.get(key).copied().unwrap_or(default)
    }

    fn set(&mut self, key: &str, value: i64) {
        if self.snapshot.values.insert(key.to_string(), value) != Some(value) {
            self.dirty = true;
        }
    }

    fn keys(&self) -> Vec<String> {
        self.snapshot.values.keys().cloned().collect()
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        self.snapshot.saved_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&self.snapshot)?;

        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.snapshot.values.len(), "state flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = StateFile::open(dir.path().join("state.json")).unwrap();
        assert!(state.keys().is_empty());
        assert_eq!(state.get("anything", 0), 0);
    }

    #[test]
    fn get_returns_default_without_storing_it() {
        let state = MemoryState::new();
        assert_eq!(state.get("k", 42), 42);
        assert!(state.keys().is_empty());
    }

    #[test]
    fn flush_then_reopen_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = StateFile::open(&path).unwrap();
        state.set("doc-keyCount", 3);
        state.set("doc-charCount", -1);
        state.flush().unwrap();
        assert!(path.exists());

        let reopened = StateFile::open(&path).unwrap();
        assert_eq!(reopened.get("doc-keyCount", 0), 3);
        assert_eq!(reopened.get("doc-charCount", 0), -1);
        assert!(reopened.saved_at().is_some());
    }

    #[test]
    fn writes_are_visible_before_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut state = StateFile::open(&path).unwrap();
        state.set("k", 9);
        assert_eq!(state.get("k", 0), 9);
        assert!(!path.exists());
    }

    #[test]
    fn rewriting_same_value_is_not_dirty() {
        let dir = TempDir::new().unwrap();
        let mut state = StateFile::open(dir.path().join("state.json")).unwrap();
        state.set("k", 1);
        state.flush().unwrap();
        state.set("k", 1);
        assert!(!state.dirty);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            StateFile::open(&path),
            Err(crate::error::Error::Json(_))
        ));
    }

    #[test]
    fn file_without_timestamp_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{ "values": { "a-keyCount": 2 } }"#).unwrap();
        let state = StateFile::open(&path).unwrap();
        assert_eq!(state.get("a-keyCount", 0), 2);
        assert!(state.saved_at().is_none());
    }
}
