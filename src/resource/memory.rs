//! In-memory fetcher
//!
//! Serves collections and documents captured in a JSON replay file, so a
//! report can be rendered offline from previously saved API responses.

use super::fetcher::{Fetcher, ResourceFilter};
use crate::cloud::auth::IdentityInfo;
use crate::cloud::CloudError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// On-disk replay format
///
/// ```json
/// {
///   "project_id": "p1",
///   "identity": { "project": "demo", "user": "alice", "roles": ["member"] },
///   "collections": { "ports": [ ... ], "networks": [ ... ] },
///   "documents": { "compute-limits": { ... }, "flavor/f1": { ... } }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ReplayFile {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub identity: Option<IdentityInfo>,
    #[serde(default)]
    pub collections: HashMap<String, Vec<Value>>,
    #[serde(default)]
    pub documents: HashMap<String, Value>,
}

/// Fetcher backed by in-memory maps. Keys that are absent behave like an
/// unsupported API extension.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    collections: HashMap<String, Vec<Value>>,
    documents: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
    pub project_id: Option<String>,
    pub identity: Option<IdentityInfo>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_replay(replay: ReplayFile) -> Self {
        Self {
            collections: replay.collections,
            documents: replay.documents,
            calls: Mutex::new(Vec::new()),
            project_id: replay.project_id,
            identity: replay.identity,
        }
    }

    /// Load a replay file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let replay: ReplayFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self::from_replay(replay))
    }

    pub fn with_collection(mut self, key: &str, items: Vec<Value>) -> Self {
        self.collections.insert(key.to_string(), items);
        self
    }

    /// Register a document. `key` is either a bare resource key or
    /// `resource-key/id`.
    pub fn with_document(mut self, key: &str, doc: Value) -> Self {
        self.documents.insert(key.to_string(), doc);
        self
    }

    /// Every call made so far, as `list:<key>` or `show:<key>/<id>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Whether any call touched the given resource key
    pub fn was_called(&self, resource_key: &str) -> bool {
        self.calls().iter().any(|c| {
            let rest = c.split_once(':').map(|(_, r)| r).unwrap_or(c);
            rest == resource_key || rest.starts_with(&format!("{}/", resource_key))
        })
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn list(&self, resource_key: &str, filters: &[ResourceFilter]) -> Result<Vec<Value>, CloudError> {
        self.record(format!("list:{}", resource_key));

        let items = self
            .collections
            .get(resource_key)
            .ok_or_else(|| CloudError::Unsupported(resource_key.to_string()))?;

        Ok(items
            .iter()
            .filter(|item| filters.iter().all(|f| f.matches(item)))
            .cloned()
            .collect())
    }

    async fn show(&self, resource_key: &str, id: &str) -> Result<Value, CloudError> {
        self.record(format!("show:{}/{}", resource_key, id));

        self.documents
            .get(&format!("{}/{}", resource_key, id))
            .or_else(|| self.documents.get(resource_key))
            .cloned()
            .ok_or_else(|| CloudError::Unsupported(format!("{}/{}", resource_key, id)))
    }
}
