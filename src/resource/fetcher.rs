//! Resource Fetcher
//!
//! Handles fetching collections and single documents from OpenStack APIs
//! based on resource definitions, and the degrade-to-empty policy the report
//! core relies on.

use super::registry::{get_resource, ResourceDef};
use crate::cloud::client::{join_url, CloudClient};
use crate::cloud::CloudError;
use async_trait::async_trait;
use serde_json::Value;

/// Upper bound on pages for one collection, in case a server keeps
/// returning next links
const MAX_PAGES: usize = 1000;

/// Filter for resources
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    pub param: String,
    pub values: Vec<String>,
}

impl ResourceFilter {
    pub fn new(param: &str, values: Vec<String>) -> Self {
        Self {
            param: param.to_string(),
            values,
        }
    }

    /// Whether a record passes this filter. Records without the field pass.
    pub fn matches(&self, item: &Value) -> bool {
        match item.get(&self.param).and_then(|v| v.as_str()) {
            Some(value) => self.values.iter().any(|v| v == value),
            None => true,
        }
    }
}

/// Source of resource collections and documents
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a whole collection (all pages)
    async fn list(&self, resource_key: &str, filters: &[ResourceFilter]) -> Result<Vec<Value>, CloudError>;

    /// Fetch one document, e.g. a flavor by id or a project's quota set
    async fn show(&self, resource_key: &str, id: &str) -> Result<Value, CloudError>;
}

#[async_trait]
impl Fetcher for CloudClient {
    async fn list(&self, resource_key: &str, filters: &[ResourceFilter]) -> Result<Vec<Value>, CloudError> {
        fetch_resources(resource_key, self, filters).await
    }

    async fn show(&self, resource_key: &str, id: &str) -> Result<Value, CloudError> {
        fetch_single(resource_key, self, id).await
    }
}

/// A fetched collection. `available` is false when the fetch failed, which
/// the report uses to mark dependent features unavailable.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub items: Vec<Value>,
    pub available: bool,
}

impl Collection {
    pub fn available(items: Vec<Value>) -> Self {
        Self {
            items,
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

/// Fetch a collection, substituting an empty one on any failure
pub async fn fetch_or_empty<F: Fetcher + ?Sized>(
    fetcher: &F,
    resource_key: &str,
    filters: &[ResourceFilter],
) -> Collection {
    match fetcher.list(resource_key, filters).await {
        Ok(items) => {
            tracing::debug!("Fetched {} {}", items.len(), resource_key);
            Collection::available(items)
        }
        Err(e) if e.is_unsupported() => {
            tracing::info!("{} not available: {}", resource_key, e);
            Collection::unavailable()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", resource_key, e);
            Collection::unavailable()
        }
    }
}

/// Fetch a single document, substituting `None` on any failure
pub async fn show_or_none<F: Fetcher + ?Sized>(fetcher: &F, resource_key: &str, id: &str) -> Option<Value> {
    match fetcher.show(resource_key, id).await {
        Ok(Value::Null) => None,
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::debug!("{} unavailable: {}", resource_key, e);
            None
        }
    }
}

/// Result of paginated fetch
pub struct PaginatedResult {
    pub items: Vec<Value>,
    pub next_url: Option<String>,
}

/// Fetch all resources (auto-paginate)
pub async fn fetch_resources(
    resource_key: &str,
    client: &CloudClient,
    filters: &[ResourceFilter],
) -> Result<Vec<Value>, CloudError> {
    let mut all_items = Vec::new();
    let mut next_url: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let result = fetch_resources_paginated(resource_key, client, filters, next_url.as_deref()).await?;
        all_items.extend(result.items);

        match result.next_url {
            Some(url) if Some(url.as_str()) != next_url.as_deref() => next_url = Some(url),
            _ => return Ok(all_items),
        }
    }

    tracing::warn!("{}: stopped after {} pages", resource_key, MAX_PAGES);
    Ok(all_items)
}

/// Fetch one page of resources
pub async fn fetch_resources_paginated(
    resource_key: &str,
    client: &CloudClient,
    filters: &[ResourceFilter],
    page_url: Option<&str>,
) -> Result<PaginatedResult, CloudError> {
    let Some(resource_def) = get_resource(resource_key) else {
        return Err(CloudError::UnknownResource(resource_key.to_string()));
    };

    let url = match page_url {
        Some(url) => url.to_string(),
        None => {
            let url = client.service_url(&resource_def.service, &resource_def.path).await?;
            add_query_params(&url, &resource_def.params, filters)
        }
    };

    let response = client.get(&url).await?;
    let items = extract_items(&response, resource_def);

    let next_url = match next_link(&response, &resource_def.response_path) {
        Some(href) if href.starts_with("http://") || href.starts_with("https://") => Some(href),
        Some(href) => {
            // Glance returns root-relative links that repeat the version prefix
            let base = client.endpoint(&resource_def.service).await?;
            Some(join_url(&base, href.trim_start_matches('/'))?)
        }
        None => None,
    };

    Ok(PaginatedResult { items, next_url })
}

/// Fetch a single document
pub async fn fetch_single(resource_key: &str, client: &CloudClient, id: &str) -> Result<Value, CloudError> {
    let Some(resource_def) = get_resource(resource_key) else {
        return Err(CloudError::UnknownResource(resource_key.to_string()));
    };

    let url = client
        .service_url(&resource_def.service, &resource_def.path_for(id))
        .await?;
    let url = add_query_params(&url, &resource_def.params, &[]);
    let response = client.get(&url).await?;

    navigate(&response, &resource_def.response_path)
        .cloned()
        .ok_or_else(|| CloudError::Decode(format!("{}: no '{}' in response", resource_key, resource_def.response_path)))
}

fn navigate<'a>(response: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(response);
    }
    path.split('.').try_fold(response, |current, part| current.get(part))
}

/// Extract items from response using the response_path
pub fn extract_items(response: &Value, resource_def: &ResourceDef) -> Vec<Value> {
    let raw_items = navigate(response, &resource_def.response_path)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    match resource_def.unwrap_field.as_deref() {
        Some(field) => raw_items
            .into_iter()
            .map(|item| match item.get(field) {
                Some(inner) => inner.clone(),
                None => item,
            })
            .collect(),
        None => raw_items,
    }
}

/// Find the next-page link: `<collection>_links` with `rel=next`
/// (Nova, Neutron, Cinder) or a top-level `next` (Glance)
pub fn next_link(response: &Value, response_path: &str) -> Option<String> {
    let links_key = format!("{}_links", response_path);
    if let Some(links) = response.get(&links_key).and_then(|v| v.as_array()) {
        return links
            .iter()
            .find(|l| l.get("rel").and_then(|r| r.as_str()) == Some("next"))
            .and_then(|l| l.get("href"))
            .and_then(|h| h.as_str())
            .map(|s| s.to_string());
    }

    response
        .get("next")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn add_query_params(url: &str, params: &Value, filters: &[ResourceFilter]) -> String {
    let mut query_parts: Vec<String> = Vec::new();

    if let Value::Object(map) = params {
        for (key, value) in map {
            match value {
                Value::String(s) => {
                    query_parts.push(format!("{}={}", key, urlencoding::encode(s)));
                }
                Value::Array(arr) => {
                    for item in arr {
                        if let Value::String(s) = item {
                            query_parts.push(format!("{}={}", key, urlencoding::encode(s)));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    for filter in filters {
        for value in &filter.values {
            query_parts.push(format!("{}={}", filter.param, urlencoding::encode(value)));
        }
    }

    if query_parts.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query_parts.join("&"))
    } else {
        format!("{}?{}", url, query_parts.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_link_from_collection_links() {
        let response = json!({
            "ports": [],
            "ports_links": [
                {"rel": "previous", "href": "https://n/v2.0/ports?marker=a&page_reverse=True"},
                {"rel": "next", "href": "https://n/v2.0/ports?marker=z"}
            ]
        });
        assert_eq!(
            next_link(&response, "ports").as_deref(),
            Some("https://n/v2.0/ports?marker=z")
        );
    }

    #[test]
    fn test_next_link_glance_style() {
        let response = json!({"images": [], "next": "/v2/images?marker=abc"});
        assert_eq!(next_link(&response, "images").as_deref(), Some("/v2/images?marker=abc"));
        assert_eq!(next_link(&json!({"images": []}), "images"), None);
    }

    #[test]
    fn test_extract_items_unwraps_keypairs() {
        let def = get_resource("keypairs").unwrap();
        let response = json!({"keypairs": [{"keypair": {"name": "k1", "type": "ssh"}}]});
        let items = extract_items(&response, def);
        assert_eq!(items, vec![json!({"name": "k1", "type": "ssh"})]);
    }

    #[test]
    fn test_add_query_params_encodes_filters() {
        let url = add_query_params(
            "https://n/v2.0/ports",
            &json!({"usage": "true"}),
            &[ResourceFilter::new("project_id", vec!["p 1".to_string()])],
        );
        assert_eq!(url, "https://n/v2.0/ports?usage=true&project_id=p%201");
    }

    #[test]
    fn test_filter_matches_missing_field() {
        let filter = ResourceFilter::new("project_id", vec!["p1".to_string()]);
        assert!(filter.matches(&json!({"project_id": "p1"})));
        assert!(!filter.matches(&json!({"project_id": "p2"})));
        assert!(filter.matches(&json!({"id": "x"})));
    }

    #[test]
    fn test_navigate_nested_path() {
        let doc = json!({"limits": {"absolute": {"maxTotalCores": 20}}});
        assert_eq!(
            navigate(&doc, "limits.absolute").and_then(|v| v.get("maxTotalCores")),
            Some(&json!(20))
        );
        assert!(navigate(&doc, "quota_set").is_none());
    }
}
