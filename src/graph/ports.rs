//! Port topology
//!
//! Turns raw port records into [`PortRow`]s with every cross-reference
//! resolved: fixed IPs, attached floating IPs, security groups, what the port
//! is bound to, its trunk role, QoS policy and binding diagnostics.

use super::attrs::{self, array_of, display_scalar, id_list, opt_str, str_field, str_of};
use super::index::record_id;
use super::kind::ResourceType;
use super::resolver::NameResolver;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Default `ports` columns
pub const DEFAULT_COLUMNS: &[&str] = &["id", "bound_to", "ips", "fips", "status", "secgroups", "device_owner"];

/// Columns added by `--wide`
pub const WIDE_EXTRA_COLUMNS: &[&str] = &[
    "network",
    "host",
    "vif_type",
    "vnic_type",
    "mac",
    "qos_policy",
    "port_security",
    "trunk",
    "dns",
    "tags",
    "admin",
    "age",
];

/// Every column a [`PortRow`] can render
pub const ALL_COLUMNS: &[&str] = &[
    "id",
    "name",
    "network",
    "ips",
    "fips",
    "status",
    "admin",
    "secgroups",
    "device_owner",
    "bound_to",
    "host",
    "vif_type",
    "vnic_type",
    "mac",
    "qos_policy",
    "port_security",
    "trunk",
    "dns",
    "tags",
    "age",
    "aap",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Server,
    RouterInterface,
    LoadBalancer,
}

impl BindingKind {
    pub fn resource_type(self) -> ResourceType {
        match self {
            Self::Server => ResourceType::Server,
            Self::RouterInterface => ResourceType::Router,
            Self::LoadBalancer => ResourceType::LoadBalancer,
        }
    }
}

/// What a port's `device_id` points at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PortBinding {
    Classified { kind: BindingKind, name: String },
    Unknown { raw_id: String },
    #[default]
    Unbound,
}

impl PortBinding {
    /// Display value for the `bound_to` column
    pub fn bound_to(&self) -> &str {
        match self {
            Self::Classified { name, .. } => name,
            Self::Unknown { raw_id } => raw_id,
            Self::Unbound => "",
        }
    }

    pub fn kind(&self) -> Option<BindingKind> {
        match self {
            Self::Classified { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

struct OwnerRule {
    matches: fn(&str) -> bool,
    kind: BindingKind,
}

/// `device_owner` rules, checked in order
const OWNER_RULES: &[OwnerRule] = &[
    OwnerRule {
        matches: |owner| owner.starts_with("compute"),
        kind: BindingKind::Server,
    },
    OwnerRule {
        matches: |owner| owner.starts_with("network:router"),
        kind: BindingKind::RouterInterface,
    },
    OwnerRule {
        matches: |owner| {
            let owner = owner.to_ascii_lowercase();
            owner.contains("loadbalancer") || owner.contains("octavia")
        },
        kind: BindingKind::LoadBalancer,
    },
];

/// Lookup order when the owner matches no rule
const FALLBACK_KINDS: [BindingKind; 3] = [BindingKind::Server, BindingKind::RouterInterface, BindingKind::LoadBalancer];

/// Classify a port binding from its `device_owner` and `device_id`
pub fn classify_binding(resolver: &NameResolver, device_owner: &str, device_id: &str) -> PortBinding {
    if device_id.is_empty() {
        return PortBinding::Unbound;
    }

    if let Some(rule) = OWNER_RULES.iter().find(|rule| (rule.matches)(device_owner)) {
        let kind = rule.kind;
        let name = if resolver.is_available(kind.resource_type()) {
            resolver.name_or_id(kind.resource_type(), device_id)
        } else {
            device_id.to_string()
        };
        return PortBinding::Classified { kind, name };
    }

    FALLBACK_KINDS
        .iter()
        .find_map(|kind| {
            resolver
                .try_name(kind.resource_type(), device_id)
                .map(|name| PortBinding::Classified {
                    kind: *kind,
                    name: name.to_string(),
                })
        })
        .unwrap_or_else(|| PortBinding::Unknown {
            raw_id: device_id.to_string(),
        })
}

/// A port's role in a VLAN-aware trunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrunkRole {
    #[default]
    None,
    Parent {
        trunk_id: String,
        trunk_name: String,
        subports: usize,
    },
    Subport {
        trunk_id: String,
        trunk_name: String,
        segmentation_type: String,
        segmentation_id: String,
    },
}

impl fmt::Display for TrunkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Parent {
                trunk_name, subports, ..
            } => write!(f, "TRUNK-PARENT {} (subports={})", trunk_name, subports),
            Self::Subport {
                trunk_name,
                segmentation_type,
                segmentation_id,
                ..
            } => write!(
                f,
                "TRUNK-SUBPORT of {} [{}:{}]",
                trunk_name, segmentation_type, segmentation_id
            ),
        }
    }
}

/// `port_id -> TrunkRole`, built once from every trunk. A port listed both
/// as a parent and as a subport is a parent.
#[derive(Debug, Default)]
pub struct TrunkIndex {
    roles: HashMap<String, TrunkRole>,
}

impl TrunkIndex {
    pub fn build<'a, I>(trunks: I, resolver: &NameResolver) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
        I::IntoIter: Clone,
    {
        let trunks = trunks.into_iter();
        let mut roles = HashMap::new();

        for trunk in trunks.clone() {
            let trunk_id = record_id(trunk).unwrap_or_default();
            let trunk_name = resolver.name_or_id(ResourceType::Trunk, trunk_id);
            for sub in array_of(trunk, "sub_ports") {
                let Some(port_id) = opt_str(sub, "port_id") else {
                    continue;
                };
                roles.entry(port_id.to_string()).or_insert_with(|| TrunkRole::Subport {
                    trunk_id: trunk_id.to_string(),
                    trunk_name: trunk_name.clone(),
                    segmentation_type: sub.get("segmentation_type").map(display_scalar).unwrap_or_default(),
                    segmentation_id: sub.get("segmentation_id").map(display_scalar).unwrap_or_default(),
                });
            }
        }

        for trunk in trunks {
            let Some(port_id) = opt_str(trunk, "port_id") else {
                continue;
            };
            let trunk_id = record_id(trunk).unwrap_or_default();
            roles.insert(
                port_id.to_string(),
                TrunkRole::Parent {
                    trunk_id: trunk_id.to_string(),
                    trunk_name: resolver.name_or_id(ResourceType::Trunk, trunk_id),
                    subports: array_of(trunk, "sub_ports").len(),
                },
            );
        }

        Self { roles }
    }

    pub fn role(&self, port_id: &str) -> TrunkRole {
        self.roles.get(port_id).cloned().unwrap_or_default()
    }
}

/// `port_id -> [floating IP]`
#[derive(Debug, Default)]
pub struct FloatingIpIndex {
    by_port: HashMap<String, Vec<Value>>,
}

impl FloatingIpIndex {
    pub fn build<'a, I>(floating_ips: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut by_port: HashMap<String, Vec<Value>> = HashMap::new();
        for fip in floating_ips {
            if let Some(port_id) = opt_str(fip, "port_id") {
                by_port.entry(port_id.to_string()).or_default().push(fip.clone());
            }
        }
        Self { by_port }
    }

    pub fn for_port(&self, port_id: &str) -> &[Value] {
        self.by_port.get(port_id).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// One fully resolved port, every column pre-rendered
#[derive(Debug, Clone, Default)]
pub struct PortRow {
    pub id: String,
    pub name: String,
    pub network: String,
    pub ips: String,
    pub fips: String,
    pub status: String,
    pub admin: String,
    pub secgroups: String,
    pub device_owner: String,
    pub bound_to: String,
    pub host: String,
    pub vif_type: String,
    pub vnic_type: String,
    pub mac: String,
    pub qos_policy: String,
    pub port_security: String,
    pub trunk: String,
    pub dns: String,
    pub tags: String,
    pub age: String,
    pub aap: String,
    pub binding: PortBinding,
    pub trunk_role: TrunkRole,
}

impl PortRow {
    /// Value of a named column, `None` for unknown column names
    pub fn column(&self, name: &str) -> Option<&str> {
        let value = match name {
            "id" => &self.id,
            "name" => &self.name,
            "network" => &self.network,
            "ips" => &self.ips,
            "fips" => &self.fips,
            "status" => &self.status,
            "admin" => &self.admin,
            "secgroups" => &self.secgroups,
            "device_owner" => &self.device_owner,
            "bound_to" => &self.bound_to,
            "host" => &self.host,
            "vif_type" => &self.vif_type,
            "vnic_type" => &self.vnic_type,
            "mac" => &self.mac,
            "qos_policy" => &self.qos_policy,
            "port_security" => &self.port_security,
            "trunk" => &self.trunk,
            "dns" => &self.dns,
            "tags" => &self.tags,
            "age" => &self.age,
            "aap" => &self.aap,
            _ => return None,
        };
        Some(value)
    }
}

/// Resolves ports against one snapshot's indexes
pub struct PortAssembler<'a> {
    resolver: &'a NameResolver,
    trunks: &'a TrunkIndex,
    floating_ips: &'a FloatingIpIndex,
    now: DateTime<Utc>,
}

impl<'a> PortAssembler<'a> {
    pub fn new(
        resolver: &'a NameResolver,
        trunks: &'a TrunkIndex,
        floating_ips: &'a FloatingIpIndex,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            resolver,
            trunks,
            floating_ips,
            now,
        }
    }

    pub fn rows<'p, I>(&self, ports: I) -> Vec<PortRow>
    where
        I: IntoIterator<Item = &'p Value>,
    {
        ports.into_iter().map(|port| self.row(port)).collect()
    }

    pub fn row(&self, port: &Value) -> PortRow {
        let r = self.resolver;
        let id = str_of(port, "id").to_string();
        let device_owner = str_of(port, "device_owner").to_string();
        let binding = classify_binding(r, &device_owner, str_of(port, "device_id"));
        let trunk_role = self.trunks.role(&id);

        PortRow {
            name: str_of(port, "name").to_string(),
            network: r.name_or_id(ResourceType::Network, str_of(port, "network_id")),
            ips: self.fixed_ips(port),
            fips: self.floating_ips(&id),
            status: str_of(port, "status").to_string(),
            admin: admin_state(port).to_string(),
            secgroups: self.security_groups(port),
            bound_to: binding.bound_to().to_string(),
            device_owner,
            host: str_field(port, &attrs::BINDING_HOST).unwrap_or_default().to_string(),
            vif_type: str_field(port, &attrs::BINDING_VIF_TYPE).unwrap_or_default().to_string(),
            vnic_type: str_field(port, &attrs::BINDING_VNIC_TYPE).unwrap_or_default().to_string(),
            mac: str_of(port, "mac_address").to_string(),
            qos_policy: self.qos_policy(port),
            port_security: match attrs::bool_field(port, &attrs::PORT_SECURITY) {
                Some(true) => "on".to_string(),
                Some(false) => "off".to_string(),
                None => String::new(),
            },
            trunk: trunk_role.to_string(),
            dns: dns_name(port),
            tags: array_of(port, "tags")
                .iter()
                .filter_map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(","),
            age: human_age(str_of(port, "created_at"), self.now),
            aap: array_of(port, "allowed_address_pairs")
                .iter()
                .map(|pair| format!("{}({})", str_of(pair, "ip_address"), str_of(pair, "mac_address")))
                .collect::<Vec<_>>()
                .join(","),
            id,
            binding,
            trunk_role,
        }
    }

    fn fixed_ips(&self, port: &Value) -> String {
        array_of(port, "fixed_ips")
            .iter()
            .map(|fixed| {
                let subnet_id = str_of(fixed, "subnet_id");
                let subnet = self.resolver.name_or_id(ResourceType::Subnet, subnet_id);
                let network = self
                    .resolver
                    .get(ResourceType::Subnet, subnet_id)
                    .map(|s| self.resolver.name_or_id(ResourceType::Network, str_of(s, "network_id")))
                    .unwrap_or_default();
                format!(
                    "ip_address='{}', subnet='{}({})'",
                    str_of(fixed, "ip_address"),
                    subnet,
                    network
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn floating_ips(&self, port_id: &str) -> String {
        self.floating_ips
            .for_port(port_id)
            .iter()
            .map(|fip| {
                let mut entry = format!(
                    "fip='{}', external_net='{}'",
                    str_of(fip, "floating_ip_address"),
                    self.resolver
                        .name_or_id(ResourceType::Network, str_of(fip, "floating_network_id"))
                );
                if let Some(router_id) = opt_str(fip, "router_id") {
                    entry.push_str(&format!(
                        ", router='{}'",
                        self.resolver.name_or_id(ResourceType::Router, router_id)
                    ));
                }
                entry
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn security_groups(&self, port: &Value) -> String {
        security_group_ids(port)
            .iter()
            .map(|id| self.resolver.name_or_id(ResourceType::SecurityGroup, id))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn qos_policy(&self, port: &Value) -> String {
        match opt_str(port, "qos_policy_id") {
            Some(id) if self.resolver.is_available(ResourceType::QosPolicy) => {
                self.resolver.name_or_id(ResourceType::QosPolicy, id)
            }
            _ => String::new(),
        }
    }
}

/// Security group ids of a port, from `security_group_ids` or
/// `security_groups` (ids or embedded group objects)
pub fn security_group_ids(port: &Value) -> Vec<String> {
    attrs::lookup(port, &attrs::SECURITY_GROUPS)
        .and_then(|v| v.as_array())
        .map(|groups| id_list(groups))
        .unwrap_or_default()
}

/// `UP`, `DOWN`, or empty when the port carries no admin state
pub fn admin_state(record: &Value) -> &'static str {
    match attrs::bool_field(record, &attrs::ADMIN_STATE_UP) {
        Some(true) => "UP",
        Some(false) => "DOWN",
        None => "",
    }
}

fn dns_name(port: &Value) -> String {
    if let Some(name) = opt_str(port, "dns_name") {
        return name.to_string();
    }
    array_of(port, "dns_assignment")
        .iter()
        .find_map(|a| opt_str(a, "fqdn"))
        .unwrap_or_default()
        .to_string()
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if ts.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Human age of an ISO timestamp: `Nd Nh`, `Nh Nm` or `Nm`. Empty when the
/// timestamp is missing or unparsable.
pub fn human_age(ts: &str, now: DateTime<Utc>) -> String {
    let Some(created) = parse_timestamp(ts) else {
        return String::new();
    };
    let total = (now - created).num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn resolver() -> NameResolver {
        let mut r = NameResolver::default();
        r.load(
            ResourceType::Server,
            &[json!({"id": "s1", "name": "web-1"}), json!({"id": "s2", "name": "dup"}), json!({"id": "s3", "name": "dup"})],
        );
        r.load(ResourceType::Router, &[json!({"id": "r1", "name": "edge"})]);
        r.load(ResourceType::LoadBalancer, &[json!({"id": "lb1", "name": "front"})]);
        r.load(ResourceType::Network, &[json!({"id": "n1", "name": "private"}), json!({"id": "ext", "name": "public"})]);
        r.load(ResourceType::Subnet, &[json!({"id": "sn1", "name": "private-v4", "network_id": "n1"})]);
        r.load(ResourceType::SecurityGroup, &[json!({"id": "sg1", "name": "default"})]);
        r.load(ResourceType::Trunk, &[json!({"id": "t1", "name": "trunk-a"})]);
        r.load(ResourceType::QosPolicy, &[json!({"id": "q1", "name": "gold"})]);
        r
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_owner_rules_in_order() {
        let r = resolver();
        assert_eq!(
            classify_binding(&r, "compute:nova", "s1"),
            PortBinding::Classified {
                kind: BindingKind::Server,
                name: "web-1".into()
            }
        );
        assert_eq!(classify_binding(&r, "compute:az1", "s2").bound_to(), "s2");
        assert_eq!(
            classify_binding(&r, "network:router_interface", "r1").kind(),
            Some(BindingKind::RouterInterface)
        );
        assert_eq!(
            classify_binding(&r, "Octavia", "lb1"),
            PortBinding::Classified {
                kind: BindingKind::LoadBalancer,
                name: "front".into()
            }
        );
        assert_eq!(
            classify_binding(&r, "neutron:LOADBALANCERV2", "lb1").kind(),
            Some(BindingKind::LoadBalancer)
        );
    }

    #[test]
    fn test_loadbalancer_unavailable_keeps_raw_id() {
        let mut r = resolver();
        r.mark_unavailable(ResourceType::LoadBalancer);
        assert_eq!(classify_binding(&r, "Octavia", "lb1").bound_to(), "lb1");
    }

    #[test]
    fn test_fallback_lookup_and_unknown() {
        let r = resolver();
        assert_eq!(
            classify_binding(&r, "network:dhcp", "r1"),
            PortBinding::Classified {
                kind: BindingKind::RouterInterface,
                name: "edge".into()
            }
        );
        assert_eq!(
            classify_binding(&r, "", "mystery"),
            PortBinding::Unknown {
                raw_id: "mystery".into()
            }
        );
        assert_eq!(classify_binding(&r, "compute:nova", ""), PortBinding::Unbound);
    }

    #[test]
    fn test_trunk_roles_with_parent_precedence() {
        let r = resolver();
        let trunks = vec![
            json!({"id": "t1", "port_id": "p-parent", "sub_ports": [
                {"port_id": "p-sub", "segmentation_type": "vlan", "segmentation_id": 101},
                {"port_id": "p-both", "segmentation_type": "vlan", "segmentation_id": 102}
            ]}),
            json!({"id": "t2", "port_id": "p-both", "sub_ports": []}),
        ];
        let index = TrunkIndex::build(&trunks, &r);

        assert_eq!(index.role("p-parent").to_string(), "TRUNK-PARENT trunk-a (subports=2)");
        assert_eq!(index.role("p-sub").to_string(), "TRUNK-SUBPORT of trunk-a [vlan:101]");
        assert!(matches!(index.role("p-both"), TrunkRole::Parent { subports: 0, .. }));
        assert_eq!(index.role("p-none"), TrunkRole::None);
        assert_eq!(index.role("p-none").to_string(), "");
    }

    #[test]
    fn test_full_row() {
        let r = resolver();
        let trunks = TrunkIndex::default();
        let fips = FloatingIpIndex::build(&[json!({
            "floating_ip_address": "203.0.113.5",
            "floating_network_id": "ext",
            "router_id": "r1",
            "port_id": "p1"
        })]);
        let assembler = PortAssembler::new(&r, &trunks, &fips, now());

        let row = assembler.row(&json!({
            "id": "p1",
            "network_id": "n1",
            "device_owner": "compute:nova",
            "device_id": "s1",
            "fixed_ips": [
                {"ip_address": "10.0.0.5", "subnet_id": "sn1"},
                {"ip_address": "10.9.0.5", "subnet_id": "gone"}
            ],
            "security_groups": [{"id": "sg1", "name": "default"}, "sg-x"],
            "binding:host_id": "cmp-1",
            "binding_vif_type": "ovs",
            "binding": {"vnic_type": "normal"},
            "admin_state_up": true,
            "port_security_enabled": false,
            "qos_policy_id": "q1",
            "dns_assignment": [{"fqdn": "web-1.example."}],
            "tags": ["a", "b"],
            "allowed_address_pairs": [{"ip_address": "10.0.0.100", "mac_address": "fa:16:3e:00:00:01"}],
            "created_at": "2025-03-08T09:30:00Z"
        }));

        assert_eq!(row.bound_to, "web-1");
        assert_eq!(row.network, "private");
        assert_eq!(
            row.ips,
            "ip_address='10.0.0.5', subnet='private-v4(private)'; ip_address='10.9.0.5', subnet='gone()'"
        );
        assert_eq!(row.fips, "fip='203.0.113.5', external_net='public', router='edge'");
        assert_eq!(row.secgroups, "default,sg-x");
        assert_eq!((row.host.as_str(), row.vif_type.as_str(), row.vnic_type.as_str()), ("cmp-1", "ovs", "normal"));
        assert_eq!(row.admin, "UP");
        assert_eq!(row.port_security, "off");
        assert_eq!(row.qos_policy, "gold");
        assert_eq!(row.dns, "web-1.example.");
        assert_eq!(row.tags, "a,b");
        assert_eq!(row.aap, "10.0.0.100(fa:16:3e:00:00:01)");
        assert_eq!(row.age, "2d 2h");
        assert_eq!(row.column("bound_to"), Some("web-1"));
        assert_eq!(row.column("nope"), None);
    }

    #[test]
    fn test_sparse_port_degrades_to_empty() {
        let mut r = resolver();
        r.mark_unavailable(ResourceType::QosPolicy);
        let trunks = TrunkIndex::default();
        let fips = FloatingIpIndex::default();
        let row = PortAssembler::new(&r, &trunks, &fips, now()).row(&json!({"id": "p9", "qos_policy_id": "q1"}));

        assert_eq!(row.bound_to, "");
        assert_eq!(row.binding, PortBinding::Unbound);
        assert_eq!(row.ips, "");
        assert_eq!(row.qos_policy, "");
        assert_eq!(row.admin, "");
        assert_eq!(row.port_security, "");
        assert_eq!(row.age, "");
    }

    #[test]
    fn test_security_groups_fall_back_when_ids_empty() {
        let port = json!({"security_group_ids": [], "security_groups": ["sg1", {"id": "sg2", "name": "web"}]});
        assert_eq!(security_group_ids(&port), vec!["sg1", "sg2"]);

        let r = resolver();
        let trunks = TrunkIndex::default();
        let fips = FloatingIpIndex::default();
        let row = PortAssembler::new(&r, &trunks, &fips, now()).row(&port);
        assert_eq!(row.secgroups, "default,sg2");
    }

    #[test]
    fn test_human_age_buckets() {
        let now = now();
        assert_eq!(human_age("2025-03-10T11:15:00Z", now), "45m");
        assert_eq!(human_age("2025-03-10T09:15:00", now), "2h 45m");
        assert_eq!(human_age("2025-03-01T12:00:00.000000", now), "9d 0h");
        assert_eq!(human_age("2025-03-11T12:00:00Z", now), "0m");
        assert_eq!(human_age("yesterday", now), "");
    }
}
