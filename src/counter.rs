use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::KeyValueStore;

/// Stable identity of an open document, usable as a map key and as the
/// prefix of its durable storage keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentKey(id.into())
    }

    /// Derives the key from a file path as a `file://` URL. Relative paths
    /// are resolved against the current directory first.
    pub fn from_path(path: &Path) -> Self {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        match url::Url::from_file_path(&absolute) {
            Ok(url) => DocumentKey(url.to_string()),
            Err(()) => DocumentKey(absolute.to_string_lossy().into_owned()),
        }
    }

    pub fn untitled(n: usize) -> Self {
        DocumentKey(format!("untitled:{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn field_key(&self, field: &str) -> String {
        format!("{}-{}", self.0, field)
    }

    pub fn key_count_key(&self) -> String {
        self.field_key(KEY_COUNT_SUFFIX)
    }

    pub fn char_count_key(&self) -> String {
        self.field_key(CHAR_COUNT_SUFFIX)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const KEY_COUNT_SUFFIX: &str = "keyCount";
pub const CHAR_COUNT_SUFFIX: &str = "charCount";

/// Keystroke events and net character delta recorded for one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterPair {
    pub key_count: u64,
    pub char_count: i64,
}

impl CounterPair {
    pub fn new(key_count: u64, char_count: i64) -> Self {
        CounterPair {
            key_count,
            char_count,
        }
    }

    /// One edit notification: a single keystroke carrying `delta` net chars.
    pub fn record(self, delta: i64) -> Self {
        CounterPair {
            key_count: self.key_count.saturating_add(1),
            char_count: self.char_count.saturating_add(delta),
        }
    }
}

/// Per-document counters. Absence is the zero pair, never an error.
pub trait CounterStore {
    fn get(&self, key: &DocumentKey) -> CounterPair;

    fn set(&mut self, key: &DocumentKey, pair: CounterPair);

    fn reset(&mut self, key: &DocumentKey) {
        self.set(key, CounterPair::default());
    }

    /// Persists pending writes. Volatile stores have nothing to do.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Volatile variant: counters live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCounters {
    pairs: HashMap<DocumentKey, CounterPair>,
}

impl MemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounters {
    fn get(&self, key: &DocumentKey) -> CounterPair {
        self.pairs.get(key).copied().unwrap_or_default()
    }

    fn set(&mut self, key: &DocumentKey, pair: CounterPair) {
        self.pairs.insert(key.clone(), pair);
    }
}

/// Durable variant: each field lives in the key/value store under
/// `"<document>-keyCount"` and `"<document>-charCount"`.
#[derive(Debug)]
pub struct DurableCounters<K> {
    store: K,
}

impl<K: KeyValueStore> DurableCounters<K> {
    pub fn new(store: K) -> Self {
        DurableCounters { store }
    }

    pub fn store(&self) -> &K {
        &self.store
    }
}

impl<K: KeyValueStore> CounterStore for DurableCounters<K> {
    fn get(&self, key: &DocumentKey) -> CounterPair {
        let key_count = self.store.get(&key.key_count_key(), 0);
        let char_count = self.store.get(&key.char_count_key(), 0);
        CounterPair {
            // A hand-edited state file could hold a negative count.
            key_count: u64::try_from(key_count).unwrap_or(0),
            char_count,
        }
    }

    fn set(&mut self, key: &DocumentKey, pair: CounterPair) {
        let key_count = i64::try_from(pair.key_count).unwrap_or(i64::MAX);
        self.store.set(&key.key_count_key(), key_count);
        self.store.set(&key.char_count_key(), pair.char_count);
    }

    fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}

/// Lists every document that has counters in `store`, in key order.
pub fn documents_in<K: KeyValueStore>(store: &K) -> Vec<DocumentKey> {
    let key_suffix = format!("-{}", KEY_COUNT_SUFFIX);
    let char_suffix = format!("-{}", CHAR_COUNT_SUFFIX);
    let mut documents: Vec<DocumentKey> = store
        .keys()
        .into_iter()
        .filter_map(|k| {
            k.strip_suffix(&key_suffix)
                .or_else(|| k.strip_suffix(&char_suffix))
                .map(DocumentKey::new)
        })
        .collect();
    documents.sort();
    documents.dedup();
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryState;

    fn doc(name: &str) -> DocumentKey {
        DocumentKey::new(name)
    }

    #[test]
    fn unseen_document_reads_zero() {
        let counters = MemoryCounters::new();
        assert_eq!(counters.get(&doc("a")), CounterPair::default());

        let durable = DurableCounters::new(MemoryState::new());
        assert_eq!(durable.get(&doc("a")), CounterPair::new(0, 0));
    }

    #[test]
    fn read_after_write_sees_write() {
        let mut counters = DurableCounters::new(MemoryState::new());
        counters.set(&doc("a"), CounterPair::new(3, -2));
        assert_eq!(counters.get(&doc("a")), CounterPair::new(3, -2));
    }

    #[test]
    fn durable_keys_use_field_suffixes() {
        let mut counters = DurableCounters::new(MemoryState::new());
        let key = DocumentKey::new("file:///tmp/a.rs");
        counters.set(&key, CounterPair::new(7, 12));

        let store = counters.store();
        assert_eq!(store.get("file:///tmp/a.rs-keyCount", -1), 7);
        assert_eq!(store.get("file:///tmp/a.rs-charCount", -1), 12);
    }

    #[test]
    fn reading_missing_document_does_not_write_defaults() {
        let counters = DurableCounters::new(MemoryState::new());
        let _ = counters.get(&doc("ghost"));
        assert!(counters.store().keys().is_empty());
    }

    #[test]
    fn reset_touches_only_its_document() {
        let mut counters = MemoryCounters::new();
        counters.set(&doc("a"), CounterPair::new(4, 10));
        counters.set(&doc("b"), CounterPair::new(2, 9));

        counters.reset(&doc("a"));

        assert_eq!(counters.get(&doc("a")), CounterPair::default());
        assert_eq!(counters.get(&doc("b")), CounterPair::new(2, 9));
    }

    #[test]
    fn record_counts_one_keystroke_and_signed_delta() {
        let pair = CounterPair::default().record(12).record(-3);
        assert_eq!(pair, CounterPair::new(2, 9));
    }

    #[test]
    fn negative_stored_key_count_reads_as_zero() {
        let mut state = MemoryState::new();
        state.set("a-keyCount", -4);
        state.set("a-charCount", 5);
        let counters = DurableCounters::new(state);
        assert_eq!(counters.get(&doc("a")), CounterPair::new(0, 5));
    }

    #[test]
    fn documents_are_listed_once() {
        let mut counters = DurableCounters::new(MemoryState::new());
        counters.set(&doc("b"), CounterPair::new(1, 1));
        counters.set(&doc("a"), CounterPair::new(1, 1));
        assert_eq!(documents_in(counters.store()), vec![doc("a"), doc("b")]);
    }

    #[test]
    fn path_keys_are_file_urls() {
        let key = DocumentKey::from_path(Path::new("/tmp/notes.md"));
        assert_eq!(key.as_str(), "file:///tmp/notes.md");
        assert_eq!(key.key_count_key(), "file:///tmp/notes.md-keyCount");
    }
}
