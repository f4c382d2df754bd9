//! Typed attribute accessors
//!
//! The same attribute shows up under different keys depending on the API
//! version and extension set (`binding:host_id` vs `binding_host_id`,
//! `admin_state_up` vs `is_admin_state_up`). Each ambiguous attribute gets a
//! [`Field`] listing its known representations in priority order.

use serde_json::Value;

/// Known keys of one attribute, tried in order. `nested` is a last-resort
/// `(object, key)` pair for records that carry the attribute inside a
/// sub-object.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub keys: &'static [&'static str],
    pub nested: Option<(&'static str, &'static str)>,
}

impl Field {
    pub const fn flat(keys: &'static [&'static str]) -> Self {
        Self { keys, nested: None }
    }

    pub const fn with_nested(keys: &'static [&'static str], object: &'static str, key: &'static str) -> Self {
        Self {
            keys,
            nested: Some((object, key)),
        }
    }
}

// Ports
pub const BINDING_HOST: Field = Field::with_nested(&["binding:host_id", "binding_host_id"], "binding", "host_id");
pub const BINDING_VIF_TYPE: Field = Field::with_nested(&["binding:vif_type", "binding_vif_type"], "binding", "vif_type");
pub const BINDING_VNIC_TYPE: Field =
    Field::with_nested(&["binding:vnic_type", "binding_vnic_type"], "binding", "vnic_type");
pub const ADMIN_STATE_UP: Field = Field::flat(&["is_admin_state_up", "admin_state_up"]);
pub const PORT_SECURITY: Field = Field::flat(&["port_security_enabled", "is_port_security_enabled"]);
pub const SECURITY_GROUPS: Field = Field::flat(&["security_group_ids", "security_groups"]);

// Networks and subnets
pub const ROUTER_EXTERNAL: Field = Field::flat(&["router:external", "is_router_external", "router_external"]);
pub const SHARED: Field = Field::flat(&["shared", "is_shared"]);
pub const DHCP_ENABLED: Field = Field::flat(&["enable_dhcp", "is_dhcp_enabled"]);
pub const SUBNET_IDS: Field = Field::flat(&["subnets", "subnet_ids"]);

// Security group rules
pub const ETHERTYPE: Field = Field::flat(&["ethertype", "ether_type"]);

// Servers
pub const VM_STATE: Field = Field::flat(&["OS-EXT-STS:vm_state", "vm_state"]);
pub const POWER_STATE: Field = Field::flat(&["OS-EXT-STS:power_state", "power_state"]);
pub const SERVER_HOST: Field = Field::flat(&["OS-EXT-SRV-ATTR:host", "compute_host", "host"]);

// Flavors, keypairs, volumes
pub const EPHEMERAL: Field = Field::flat(&["OS-FLV-EXT-DATA:ephemeral", "ephemeral"]);
pub const FLAVOR_PUBLIC: Field = Field::flat(&["os-flavor-access:is_public", "is_public"]);
pub const KEY_TYPE: Field = Field::flat(&["type", "key_type"]);
pub const VOLUME_HOST: Field = Field::flat(&["os-vol-host-attr:host", "host"]);
pub const ATTACHMENT_SERVER: Field = Field::flat(&["server_id", "serverId"]);

/// First present representation of `field` on `record`. Null and empty
/// arrays count as absent, so `security_group_ids: []` falls through to
/// `security_groups`.
pub fn lookup<'a>(record: &'a Value, field: &Field) -> Option<&'a Value> {
    field
        .keys
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|v| is_present(v))
        .or_else(|| {
            let (object, key) = field.nested?;
            record.get(object)?.get(key).filter(|v| is_present(v))
        })
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Non-empty string value of `field`
pub fn str_field<'a>(record: &'a Value, field: &Field) -> Option<&'a str> {
    lookup(record, field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Boolean value of `field`; also accepts `"true"`/`"false"` strings
pub fn bool_field(record: &Value, field: &Field) -> Option<bool> {
    match lookup(record, field)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integer value of `field`; also accepts numeric strings
pub fn int_field(record: &Value, field: &Field) -> Option<i64> {
    lookup(record, field).and_then(as_int)
}

pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Plain string attribute under one key, empty when absent
pub fn str_of<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Optional non-empty string attribute under one key
pub fn opt_str<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Array attribute under one key, empty when absent or not an array
pub fn array_of<'a>(record: &'a Value, key: &str) -> &'a [Value] {
    record
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// Render a scalar for display: strings as-is, numbers and booleans via
/// `to_string`, anything else empty
pub fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Normalise a list that may hold ids or embedded `{id, name}` objects
pub fn id_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => v.get("id").and_then(|id| id.as_str()).map(|s| s.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespaced_key_wins() {
        let port = json!({"binding:host_id": "cmp-1", "binding_host_id": "cmp-2"});
        assert_eq!(str_field(&port, &BINDING_HOST), Some("cmp-1"));
    }

    #[test]
    fn test_flattened_then_nested() {
        let flat = json!({"binding_vif_type": "ovs"});
        assert_eq!(str_field(&flat, &BINDING_VIF_TYPE), Some("ovs"));

        let nested = json!({"binding": {"vnic_type": "direct"}});
        assert_eq!(str_field(&nested, &BINDING_VNIC_TYPE), Some("direct"));

        let null_first = json!({"binding:host_id": null, "binding": {"host_id": "cmp-3"}});
        assert_eq!(str_field(&null_first, &BINDING_HOST), Some("cmp-3"));

        assert_eq!(str_field(&json!({}), &BINDING_HOST), None);
    }

    #[test]
    fn test_empty_list_falls_through() {
        let port = json!({"security_group_ids": [], "security_groups": ["sg-1"]});
        assert_eq!(lookup(&port, &SECURITY_GROUPS), Some(&json!(["sg-1"])));

        let network = json!({"subnets": [], "subnet_ids": ["sn-1"]});
        assert_eq!(lookup(&network, &SUBNET_IDS), Some(&json!(["sn-1"])));

        assert_eq!(lookup(&json!({"security_group_ids": []}), &SECURITY_GROUPS), None);
    }

    #[test]
    fn test_bool_field_variants() {
        assert_eq!(bool_field(&json!({"admin_state_up": false}), &ADMIN_STATE_UP), Some(false));
        assert_eq!(bool_field(&json!({"is_admin_state_up": true}), &ADMIN_STATE_UP), Some(true));
        assert_eq!(bool_field(&json!({"router:external": "True"}), &ROUTER_EXTERNAL), Some(true));
        assert_eq!(bool_field(&json!({}), &SHARED), None);
    }

    #[test]
    fn test_int_parsing() {
        assert_eq!(as_int(&json!(4096)), Some(4096));
        assert_eq!(as_int(&json!("12")), Some(12));
        assert_eq!(as_int(&json!(2.0)), Some(2));
        assert_eq!(as_int(&json!(null)), None);
    }

    #[test]
    fn test_id_list_normalises_objects() {
        let values = vec![json!("sg-1"), json!({"id": "sg-2", "name": "web"}), json!({"name": "x"}), json!(3)];
        assert_eq!(id_list(&values), vec!["sg-1", "sg-2"]);
    }
}
