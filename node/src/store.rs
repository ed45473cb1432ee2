//! The locally held slice of the global key-value mapping.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::hash::hash_key;
use crate::ids::in_open_closed;
use crate::ids::Identifier;

/// A thread-safe store, cloneable cheaply since the map itself is shared.
#[derive(Clone)]
pub struct Store {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl Store {
    pub fn new() -> Self {
        Store { entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: String, value: String) {
        self.entries.write().unwrap().insert(key, value);
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().unwrap().remove(key)
    }

    pub fn put_all(&self, items: Vec<(String, String)>) {
        let mut entries = self.entries.write().unwrap();
        for (k, v) in items {
            entries.insert(k, v);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every `(key, value)` whose hash lies in `(start, end]`, wrap-aware.
    pub fn range_get(&self, start: Identifier, end: Identifier) -> Vec<(String, String)> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|(k, _)| in_open_closed(start, hash_key(k), end))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Atomically snapshot and delete every entry whose hash lies in `(start, end]`.
    pub fn range_remove(&self, start: Identifier, end: Identifier) -> Vec<(String, String)> {
        let mut entries = self.entries.write().unwrap();
        let matching: Vec<String> = entries
            .keys()
            .filter(|k| in_open_closed(start, hash_key(k), end))
            .cloned()
            .collect();
        matching
            .into_iter()
            .map(|k| {
                let v = entries.remove(&k).expect("key was just observed present");
                (k, v)
            })
            .collect()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
