//! Multi-key record index
//!
//! Each record is stored once behind an `Arc` and reachable from every
//! registered key-space. A record is indexed under all of its keys or not
//! at all.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

/// Extracts one key from a record
pub type KeyFn<R> = fn(&R) -> &str;

struct KeySpace<R> {
    name: &'static str,
    extract: KeyFn<R>,
    entries: HashMap<String, Arc<R>>,
}

/// Outcome of a resolve-or-scan lookup
#[derive(Debug)]
pub enum Lookup<R> {
    /// Found without contacting the backend
    Cached(Arc<R>),
    /// Found after a full backend scan
    Scanned(Arc<R>),
    /// Not found even after a scan
    Missing,
}

impl<R> Lookup<R> {
    /// The record, if any
    #[must_use]
    pub fn found(self) -> Option<Arc<R>> {
        match self {
            Lookup::Cached(r) | Lookup::Scanned(r) => Some(r),
            Lookup::Missing => None,
        }
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lookup::Cached(_))
    }
}

/// Index over several key-spaces, searched in registration order
pub struct MultiKeyIndex<R> {
    spaces: Vec<KeySpace<R>>,
    /// Canonical records in insertion order
    records: Vec<Arc<R>>,
}

impl<R> MultiKeyIndex<R> {
    /// Create an index; `spaces` fixes both the key-spaces and their
    /// resolution priority.
    #[must_use]
    pub fn new(spaces: &[(&'static str, KeyFn<R>)]) -> Self {
        Self {
            spaces: spaces
                .iter()
                .map(|&(name, extract)| KeySpace {
                    name,
                    extract,
                    entries: HashMap::new(),
                })
                .collect(),
            records: Vec::new(),
        }
    }

    /// Look `key` up in every key-space, first hit wins
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<Arc<R>> {
        self.spaces
            .iter()
            .find_map(|space| space.entries.get(key).cloned())
    }

    /// Look `key` up in a single named key-space
    #[must_use]
    pub fn resolve_in(&self, space: &str, key: &str) -> Option<Arc<R>> {
        self.spaces
            .iter()
            .find(|s| s.name == space)?
            .entries
            .get(key)
            .cloned()
    }

    /// Merge scanned records into the index.
    ///
    /// A record with an empty key in any space is skipped. A record that
    /// shares a key with an already indexed one replaces it in every
    /// space, so no stale secondary key survives. Returns the number of
    /// records indexed.
    pub fn populate_from_scan(&mut self, records: impl IntoIterator<Item = R>) -> usize {
        let mut indexed = 0;

        for record in records {
            let keys: Vec<String> = self
                .spaces
                .iter()
                .map(|space| (space.extract)(&record).to_string())
                .collect();

            if let Some(pos) = keys.iter().position(String::is_empty) {
                warn!(
                    key_space = self.spaces[pos].name,
                    "skipping record with empty key"
                );
                continue;
            }

            let stale: Vec<Arc<R>> = self
                .spaces
                .iter()
                .zip(&keys)
                .filter_map(|(space, key)| space.entries.get(key).cloned())
                .collect();
            for old in stale {
                self.evict(&old);
            }

            let record = Arc::new(record);
            for (space, key) in self.spaces.iter_mut().zip(keys) {
                space.entries.insert(key, Arc::clone(&record));
            }
            self.records.push(record);
            indexed += 1;
        }

        debug!(indexed, total = self.records.len(), "index populated");
        indexed
    }

    /// Clear, then populate from a fresh scan
    pub fn replace_from_scan(&mut self, records: impl IntoIterator<Item = R>) -> usize {
        self.clear();
        self.populate_from_scan(records)
    }

    fn evict(&mut self, old: &Arc<R>) {
        for space in &mut self.spaces {
            let key = (space.extract)(old);
            if space
                .entries
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, old))
            {
                space.entries.remove(key);
            }
        }
        self.records.retain(|r| !Arc::ptr_eq(r, old));
    }

    /// Drop every record
    pub fn clear(&mut self) {
        for space in &mut self.spaces {
            space.entries.clear();
        }
        self.records.clear();
    }

    /// Records in insertion order
    pub fn records(&self) -> impl Iterator<Item = &Arc<R>> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
