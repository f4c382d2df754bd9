//! Name Resolver
//!
//! Ambiguity-aware `id -> display name` lookup over the identifier index.
//! A name is only substituted for an id when exactly one resource of that
//! type holds it; unknown, unnamed and ambiguous ids come back unchanged.

use super::index::{record_name, ResourceIndex};
use super::kind::ResourceType;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct NameResolver {
    index: ResourceIndex,
    unavailable: HashSet<ResourceType>,
}

impl NameResolver {
    pub fn new(index: ResourceIndex) -> Self {
        Self {
            index,
            unavailable: HashSet::new(),
        }
    }

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    /// Index another collection into the underlying maps
    pub fn load<'a, I>(&mut self, kind: ResourceType, records: I)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.index.index(kind, records);
    }

    /// Record that the collection for `kind` could not be fetched
    pub fn mark_unavailable(&mut self, kind: ResourceType) {
        self.unavailable.insert(kind);
    }

    pub fn is_available(&self, kind: ResourceType) -> bool {
        !self.unavailable.contains(&kind)
    }

    pub fn get(&self, kind: ResourceType, id: &str) -> Option<&Value> {
        self.index.get(kind, id)
    }

    pub fn try_name(&self, kind: ResourceType, id: &str) -> Option<&str> {
        if id.is_empty() {
            return None;
        }
        let record = self.index.get(kind, id)?;
        let name = record_name(record)?;
        let holders = self.index.ids_named(kind, name)?;
        (holders.len() == 1).then_some(name)
    }

    pub fn name_or_id(&self, kind: ResourceType, id: &str) -> String {
        self.try_name(kind, id).unwrap_or(id).to_string()
    }

    /// `name_or_id` for an optional id, empty when absent
    pub fn name_or_id_opt(&self, kind: ResourceType, id: Option<&str>) -> String {
        id.map(|id| self.name_or_id(kind, id)).unwrap_or_default()
    }
}
