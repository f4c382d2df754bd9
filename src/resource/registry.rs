//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads the OpenStack collection and document definitions from
//! an embedded JSON file and provides lookup functions for the fetcher.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/openstack.json")];

/// Color definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ColorDef {
    pub value: String,
    pub color: [u8; 3],
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// Registry service name, mapped to catalog types by the client
    pub service: String,
    /// Path relative to the service endpoint; `{id}` is substituted for
    /// single-document lookups
    pub path: String,
    /// Fixed query parameters
    #[serde(default)]
    pub params: Value,
    /// Dot-separated path to the list (or document) in the response body
    pub response_path: String,
    /// Some list APIs wrap each item, e.g. `{"keypair": {...}}`
    #[serde(default)]
    pub unwrap_field: Option<String>,
}

impl ResourceDef {
    /// Path with the `{id}` placeholder filled in
    pub fn path_for(&self, id: &str) -> String {
        self.path.replace("{id}", &urlencoding::encode(id))
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
    #[serde(default)]
    pub color_maps: HashMap<String, Vec<ColorDef>>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
            color_maps: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
            final_config.color_maps.extend(partial.color_maps);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

/// Get a color map by name
pub fn get_color_map(name: &str) -> Option<&'static Vec<ColorDef>> {
    get_registry().color_maps.get(name)
}

/// Get color for a value based on color map name
pub fn get_color_for_value(color_map_name: &str, value: &str) -> Option<[u8; 3]> {
    get_color_map(color_map_name)?
        .iter()
        .find(|c| c.value == value)
        .map(|c| c.color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_ports_resource_exists() {
        let resource = get_resource("ports").expect("ports should exist");
        assert_eq!(resource.service, "network");
        assert_eq!(resource.response_path, "ports");
    }

    #[test]
    fn test_every_snapshot_key_is_registered() {
        let keys = get_all_resource_keys();
        for key in [
            "networks",
            "subnets",
            "routers",
            "ports",
            "security-groups",
            "security-group-rules",
            "floating-ips",
            "trunks",
            "qos-policies",
            "load-balancers",
            "servers",
            "flavors",
            "flavor",
            "images",
            "keypairs",
            "volumes",
            "snapshots",
            "backups",
            "compute-limits",
            "compute-quota-set",
            "compute-quota-usage",
            "network-quota",
            "network-quota-details",
            "volume-quota-set",
            "volume-quota-usage",
        ] {
            assert!(keys.contains(&key), "missing {}", key);
        }
    }

    #[test]
    fn test_status_color_map() {
        assert!(get_color_map("status").is_some(), "Status color map should exist");
        assert_eq!(get_color_for_value("status", "ACTIVE"), get_color_for_value("status", "UP"));
        assert_ne!(get_color_for_value("status", "ACTIVE"), get_color_for_value("status", "ERROR"));
        assert_eq!(get_color_for_value("status", "active"), None);
    }

    #[test]
    fn test_path_for_substitutes_and_encodes_id() {
        let flavor = get_resource("flavor").unwrap();
        assert_eq!(flavor.path_for("m1.small"), "flavors/m1.small");
        assert_eq!(flavor.path_for("a b"), "flavors/a%20b");
    }
}
