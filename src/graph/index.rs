//! Identifier Index
//!
//! Per resource type: `id -> record` and `name -> {ids}`. Built from the
//! fetched collections of one snapshot; indexing more collections of the same
//! type accumulates into the same maps.

use super::kind::ResourceType;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct ResourceIndex {
    by_id: HashMap<ResourceType, HashMap<String, Value>>,
    ids_by_name: HashMap<ResourceType, HashMap<String, BTreeSet<String>>>,
}

/// The id of a record, if it has a non-empty one
pub fn record_id(record: &Value) -> Option<&str> {
    record
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// The display name of a record: `name`, else `display_name`
pub fn record_name(record: &Value) -> Option<&str> {
    ["name", "display_name"]
        .iter()
        .filter_map(|key| record.get(*key).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
}

impl ResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a batch of records. Records without an id are skipped; records
    /// without a name are reachable by id only.
    pub fn index<'a, I>(&mut self, kind: ResourceType, records: I)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let by_id = self.by_id.entry(kind).or_default();
        let by_name = self.ids_by_name.entry(kind).or_default();

        for record in records {
            let Some(id) = record_id(record) else {
                continue;
            };

            // Re-indexing an id under a new name must not leave it under the old one
            if let Some(old_name) = by_id.get(id).and_then(record_name) {
                if let Some(ids) = by_name.get_mut(old_name) {
                    ids.remove(id);
                }
            }

            if let Some(name) = record_name(record) {
                by_name
                    .entry(name.to_string())
                    .or_default()
                    .insert(id.to_string());
            }
            by_id.insert(id.to_string(), record.clone());
        }
    }

    pub fn get(&self, kind: ResourceType, id: &str) -> Option<&Value> {
        self.by_id.get(&kind)?.get(id)
    }

    pub fn contains(&self, kind: ResourceType, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    /// Ids of the given type currently holding `name`
    pub fn ids_named(&self, kind: ResourceType, name: &str) -> Option<&BTreeSet<String>> {
        self.ids_by_name.get(&kind)?.get(name)
    }

    pub fn len(&self, kind: ResourceType) -> usize {
        self.by_id.get(&kind).map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.values().all(|m| m.is_empty())
    }
}
