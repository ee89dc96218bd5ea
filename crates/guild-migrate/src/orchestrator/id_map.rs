//! Run-scoped `source_id -> destination id` mapping.

use std::collections::HashMap;

use crate::core::snapshot::EntityKind;

/// Monotonic map: an entry, once written, is never replaced or removed.
/// Lives for one run and is not persisted.
#[derive(Debug, Default)]
pub struct IdMap {
    entries: HashMap<(EntityKind, String), String>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. Returns `false`, leaving the existing entry, if
    /// `source_id` is already mapped for `kind`.
    pub fn insert(&mut self, kind: EntityKind, source_id: &str, destination_id: &str) -> bool {
        let key = (kind, source_id.to_string());
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, destination_id.to_string());
        true
    }

    pub fn get(&self, kind: EntityKind, source_id: &str) -> Option<&str> {
        self.entries
            .get(&(kind, source_id.to_string()))
            .map(String::as_str)
    }
}
