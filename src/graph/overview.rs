//! Overview rows
//!
//! Pre-resolved rows for every section of the project overview. The renderer
//! only lays these out; all naming and classification happens here.

use super::attrs::{self, array_of, as_int, bool_field, display_scalar, int_field, opt_str, str_field, str_of};
use super::index::{record_id, record_name};
use super::kind::ResourceType;
use super::ports::security_group_ids;
use super::Topology;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

/// Owners of router interface ports
pub const ROUTER_INTERFACE_OWNERS: &[&str] = &[
    "network:router_interface",
    "network:router_interface_distributed",
    "network:ha_router_replicated_interface",
];

/// Server statuses that no longer count as instances
pub const TERMINAL_STATUSES: &[&str] = &["DELETED", "SOFT_DELETED"];

pub fn is_live_server(server: &Value) -> bool {
    let status = str_of(server, "status").to_ascii_uppercase();
    !TERMINAL_STATUSES.contains(&status.as_str())
}

pub fn power_state_name(state: Option<i64>) -> String {
    match state {
        Some(0) => "NOSTATE".to_string(),
        Some(1) => "RUNNING".to_string(),
        Some(3) => "PAUSED".to_string(),
        Some(4) => "SHUTDOWN".to_string(),
        Some(6) => "CRASHED".to_string(),
        Some(7) => "SUSPENDED".to_string(),
        Some(8) => "UNKNOWN".to_string(),
        Some(other) => other.to_string(),
        None => "-".to_string(),
    }
}

/// Short gateway form: `.<last octet>` for IPv4, `::<last group>` for IPv6,
/// `-` when there is no gateway and `?` when it does not parse
pub fn gateway_suffix(gateway: Option<&str>) -> String {
    let Some(gateway) = gateway.filter(|g| !g.is_empty()) else {
        return "-".to_string();
    };
    match gateway.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => format!(".{}", v4.octets()[3]),
        Ok(IpAddr::V6(v6)) => {
            let compressed = v6.to_string();
            let last = compressed.rsplit(':').next().filter(|s| !s.is_empty()).unwrap_or("0");
            format!("::{}", last)
        }
        Err(_) => "?".to_string(),
    }
}

/// Backend part of a Cinder host string (`host@backend#pool`)
pub fn backend_from_host(host: Option<&str>) -> String {
    host.and_then(|h| h.split_once('@'))
        .map(|(_, rest)| rest.split('#').next().unwrap_or(rest))
        .filter(|b| !b.is_empty())
        .unwrap_or("-")
        .to_string()
}

fn upper_or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_ascii_uppercase()
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn sort_key(record: &Value) -> String {
    record_name(record).unwrap_or_default().to_lowercase()
}

fn sorted_by_name<'a, I>(records: I) -> Vec<&'a Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut records: Vec<&Value> = records.into_iter().collect();
    records.sort_by_cached_key(|r| sort_key(r));
    records
}

fn display_name(record: &Value) -> String {
    record_name(record)
        .or_else(|| record_id(record))
        .unwrap_or("-")
        .to_string()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityRow {
    pub domain: String,
    pub project: String,
    pub user: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkGroup {
    Provider,
    External,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubnetSummary {
    pub name: String,
    pub cidr: String,
    pub gateway: String,
    pub dhcp: bool,
    pub pools: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkRow {
    pub group: NetworkGroup,
    pub name: String,
    pub status: String,
    pub admin: String,
    pub subnets: Vec<SubnetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterRow {
    pub name: String,
    pub status: String,
    pub external_network: String,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreePortRow {
    pub name: String,
    pub status: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityGroupRow {
    pub name: String,
    pub ingress: String,
    pub egress: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreeFloatingIpRow {
    pub address: String,
    pub network: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlavorRow {
    pub name: String,
    pub vcpus: i64,
    pub ram_mb: i64,
    pub disk_gb: i64,
    pub ephemeral_gb: i64,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRow {
    pub name: String,
    pub status: String,
    pub disk_format: String,
    pub container_format: String,
    pub size_mb: i64,
    pub visibility: String,
    pub min_ram: i64,
    pub min_disk: i64,
    pub min_flavor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeypairRow {
    pub name: String,
    pub key_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceRow {
    pub name: String,
    pub status: String,
    pub vm_state: String,
    pub power_state: String,
    pub host: String,
    pub image: String,
    pub flavor: String,
    pub key_name: String,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeRow {
    pub name: String,
    pub volume_type: String,
    pub size_gb: i64,
    pub status: String,
    pub backend: String,
    pub attached_to: Vec<String>,
    pub snapshots: usize,
    /// `None` when the backup API is unavailable
    pub backups: Option<usize>,
}

/// Every overview section, in display order
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overview {
    pub identity: IdentityRow,
    pub networks: Vec<NetworkRow>,
    pub routers: Vec<RouterRow>,
    pub free_ports: Vec<FreePortRow>,
    pub security_groups: Vec<SecurityGroupRow>,
    pub free_floating_ips: Vec<FreeFloatingIpRow>,
    pub flavors: Vec<FlavorRow>,
    pub images: Vec<ImageRow>,
    pub keypairs: Vec<KeypairRow>,
    pub instances: Vec<InstanceRow>,
    pub volumes: Vec<VolumeRow>,
}

impl<'s> Topology<'s> {
    pub fn overview(&self) -> Overview {
        Overview {
            identity: self.identity_row(),
            networks: self.network_rows(),
            routers: self.router_rows(),
            free_ports: self.free_port_rows(),
            security_groups: self.security_group_rows(),
            free_floating_ips: self.free_floating_ip_rows(),
            flavors: self.flavor_rows(),
            images: self.image_rows(),
            keypairs: self.keypair_rows(),
            instances: self.instance_rows(),
            volumes: self.volume_rows(),
        }
    }

    fn identity_row(&self) -> IdentityRow {
        let identity = &self.snapshot.identity;
        let or_unknown = |s: &Option<String>| {
            s.as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or("Unknown")
                .to_string()
        };
        IdentityRow {
            domain: or_unknown(&identity.domain),
            project: or_unknown(&identity.project),
            user: or_unknown(&identity.user),
            roles: identity.roles.clone(),
        }
    }

    fn network_group(&self, network: &Value) -> Option<NetworkGroup> {
        let external = bool_field(network, &attrs::ROUTER_EXTERNAL).unwrap_or(false);
        let shared = bool_field(network, &attrs::SHARED).unwrap_or(false);
        if external {
            Some(NetworkGroup::External)
        } else if shared {
            Some(NetworkGroup::Provider)
        } else if self.is_project_owned(network) {
            Some(NetworkGroup::Internal)
        } else {
            None
        }
    }

    pub(crate) fn is_project_owned(&self, record: &Value) -> bool {
        let Some(project_id) = self.snapshot.project_id.as_deref() else {
            return false;
        };
        ["project_id", "tenant_id"]
            .iter()
            .any(|key| opt_str(record, key) == Some(project_id))
    }

    fn network_rows(&self) -> Vec<NetworkRow> {
        let mut rows = Vec::new();
        for group in [NetworkGroup::Provider, NetworkGroup::External, NetworkGroup::Internal] {
            let networks = self
                .snapshot
                .networks
                .iter()
                .filter(|n| self.network_group(n) == Some(group));
            for network in sorted_by_name(networks) {
                rows.push(NetworkRow {
                    group,
                    name: display_name(network),
                    status: upper_or_dash(str_of(network, "status")),
                    admin: if bool_field(network, &attrs::ADMIN_STATE_UP).unwrap_or(false) {
                        "UP".to_string()
                    } else {
                        "DOWN".to_string()
                    },
                    subnets: self.subnet_summaries(network),
                });
            }
        }
        rows
    }

    fn subnet_summaries(&self, network: &Value) -> Vec<SubnetSummary> {
        let ids = attrs::lookup(network, &attrs::SUBNET_IDS)
            .and_then(|v| v.as_array())
            .map(|v| attrs::id_list(v))
            .unwrap_or_default();
        let subnets = ids
            .iter()
            .filter_map(|id| self.resolver.get(ResourceType::Subnet, id));

        sorted_by_name(subnets)
            .into_iter()
            .map(|subnet| {
                let pools = array_of(subnet, "allocation_pools")
                    .iter()
                    .map(|p| format!("{}-{}", str_of(p, "start"), str_of(p, "end")))
                    .collect::<Vec<_>>()
                    .join(";");
                SubnetSummary {
                    name: display_name(subnet),
                    cidr: or_dash(opt_str(subnet, "cidr")),
                    gateway: gateway_suffix(opt_str(subnet, "gateway_ip")),
                    dhcp: bool_field(subnet, &attrs::DHCP_ENABLED).unwrap_or(false),
                    pools: if pools.is_empty() { "-".to_string() } else { pools },
                }
            })
            .collect()
    }

    /// `network/subnet` for a fixed IP entry, `None` when the subnet is unknown
    fn subnet_path(&self, fixed_ip: &Value) -> Option<String> {
        let subnet_id = str_of(fixed_ip, "subnet_id");
        let subnet = self.resolver.get(ResourceType::Subnet, subnet_id)?;
        let network_id = str_of(subnet, "network_id");
        let network = if network_id.is_empty() {
            "-".to_string()
        } else {
            self.resolver.name_or_id(ResourceType::Network, network_id)
        };
        Some(format!(
            "{}/{}",
            network,
            self.resolver.name_or_id(ResourceType::Subnet, subnet_id)
        ))
    }

    fn router_rows(&self) -> Vec<RouterRow> {
        let mut interfaces: HashMap<&str, Vec<String>> = HashMap::new();
        for port in self.snapshot.ports.iter() {
            let owner = str_of(port, "device_owner");
            let device_id = str_of(port, "device_id");
            if device_id.is_empty() || !ROUTER_INTERFACE_OWNERS.iter().any(|o| owner.starts_with(o)) {
                continue;
            }
            let paths = array_of(port, "fixed_ips").iter().filter_map(|f| self.subnet_path(f));
            interfaces.entry(device_id).or_default().extend(paths);
        }

        sorted_by_name(self.snapshot.routers.iter())
            .into_iter()
            .map(|router| {
                let mut ifs = interfaces
                    .remove(str_of(router, "id"))
                    .unwrap_or_default();
                ifs.sort();
                let external_network = router
                    .get("external_gateway_info")
                    .and_then(|gw| opt_str(gw, "network_id"))
                    .map(|id| self.resolver.name_or_id(ResourceType::Network, id))
                    .unwrap_or_else(|| "-".to_string());
                RouterRow {
                    name: display_name(router),
                    status: upper_or_dash(str_of(router, "status")),
                    external_network,
                    interfaces: ifs,
                }
            })
            .collect()
    }

    fn free_port_rows(&self) -> Vec<FreePortRow> {
        let free = self
            .snapshot
            .ports
            .iter()
            .filter(|p| str_of(p, "device_owner").trim().is_empty());

        sorted_by_name(free)
            .into_iter()
            .map(|port| FreePortRow {
                name: opt_str(port, "name").unwrap_or("<no-name>").to_string(),
                status: upper_or_dash(str_of(port, "status")),
                addresses: array_of(port, "fixed_ips")
                    .iter()
                    .map(|f| {
                        format!(
                            "{} {}",
                            self.subnet_path(f).unwrap_or_else(|| "-/-".to_string()),
                            str_of(f, "ip_address")
                        )
                    })
                    .collect(),
            })
            .collect()
    }

    fn security_group_rows(&self) -> Vec<SecurityGroupRow> {
        let mut rules: HashMap<(&str, &str), Vec<&Value>> = HashMap::new();
        for rule in self.snapshot.security_group_rules.iter() {
            let direction = opt_str(rule, "direction").unwrap_or("ingress");
            rules
                .entry((str_of(rule, "security_group_id"), direction))
                .or_default()
                .push(rule);
        }

        sorted_by_name(self.snapshot.security_groups.iter())
            .into_iter()
            .map(|group| {
                let id = str_of(group, "id");
                // Older Neutron embeds the rules in the group itself
                let embedded: Vec<&Value> = array_of(group, "security_group_rules").iter().collect();
                let rules_for = |direction: &'static str| -> Vec<&Value> {
                    match rules.get(&(id, direction)) {
                        Some(found) => found.clone(),
                        None => embedded
                            .iter()
                            .copied()
                            .filter(|r| opt_str(r, "direction").unwrap_or("ingress") == direction)
                            .collect(),
                    }
                };
                SecurityGroupRow {
                    name: display_name(group),
                    ingress: self.compact_rules(&rules_for("ingress")),
                    egress: self.compact_rules(&rules_for("egress")),
                }
            })
            .collect()
    }

    /// Collapse rules sharing `(protocol, remote, ethertype)` into one segment
    pub fn compact_rules(&self, rules: &[&Value]) -> String {
        let mut groups: Vec<((String, String, String), Vec<String>)> = Vec::new();

        for rule in rules {
            let proto = opt_str(rule, "protocol").unwrap_or("any").to_string();
            let ethertype = or_dash(str_field(rule, &attrs::ETHERTYPE));
            let remote = if let Some(prefix) = opt_str(rule, "remote_ip_prefix") {
                prefix.to_string()
            } else if let Some(group_id) = opt_str(rule, "remote_group_id") {
                format!("sg:{}", self.resolver.name_or_id(ResourceType::SecurityGroup, group_id))
            } else {
                "any".to_string()
            };

            let port_min = rule.get("port_range_min").and_then(as_int).filter(|p| *p > 0);
            let port_max = rule.get("port_range_max").and_then(as_int).filter(|p| *p > 0);
            let token = match (proto.as_str(), port_min, port_max) {
                ("tcp" | "udp", Some(min), Some(max)) if min == max => min.to_string(),
                ("tcp" | "udp", Some(min), Some(max)) => format!("{}-{}", min, max),
                (p, _, _) if p.starts_with("icmp") => "icmp".to_string(),
                _ => "any".to_string(),
            };

            let key = (proto, remote, ethertype);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, tokens)) => {
                    if !tokens.contains(&token) {
                        tokens.push(token);
                    }
                }
                None => groups.push((key, vec![token])),
            }
        }

        if groups.is_empty() {
            return "-".to_string();
        }

        groups
            .iter()
            .map(|((proto, remote, ethertype), tokens)| {
                if proto == "any" {
                    format!("any to {} {}", remote, ethertype)
                } else if proto.starts_with("icmp") {
                    format!("icmp from {} {}", remote, ethertype)
                } else {
                    format!("{}:{} from {} {}", proto, tokens.join(","), remote, ethertype)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn free_floating_ip_rows(&self) -> Vec<FreeFloatingIpRow> {
        let mut free: Vec<&Value> = self
            .snapshot
            .floating_ips
            .iter()
            .filter(|f| opt_str(f, "port_id").is_none())
            .collect();
        free.sort_by(|a, b| str_of(a, "floating_ip_address").cmp(str_of(b, "floating_ip_address")));

        free.into_iter()
            .map(|fip| FreeFloatingIpRow {
                address: or_dash(opt_str(fip, "floating_ip_address")),
                network: opt_str(fip, "floating_network_id")
                    .map(|id| self.resolver.name_or_id(ResourceType::Network, id))
                    .unwrap_or_else(|| "-".to_string()),
                status: upper_or_dash(str_of(fip, "status")),
            })
            .collect()
    }

    fn flavor_rows(&self) -> Vec<FlavorRow> {
        sorted_by_name(self.snapshot.flavors.iter())
            .into_iter()
            .map(|flavor| FlavorRow {
                name: display_name(flavor),
                vcpus: flavor.get("vcpus").and_then(as_int).unwrap_or(0),
                ram_mb: flavor.get("ram").and_then(as_int).unwrap_or(0),
                disk_gb: flavor.get("disk").and_then(as_int).unwrap_or(0),
                ephemeral_gb: int_field(flavor, &attrs::EPHEMERAL).unwrap_or(0),
                public: bool_field(flavor, &attrs::FLAVOR_PUBLIC).unwrap_or(true),
            })
            .collect()
    }

    /// Smallest flavor (by RAM, disk, vCPUs, name) satisfying the image minimums
    fn min_flavor_for(&self, min_ram: i64, min_disk: i64) -> String {
        self.snapshot
            .flavors
            .iter()
            .map(|f| {
                (
                    f.get("ram").and_then(as_int).unwrap_or(0),
                    f.get("disk").and_then(as_int).unwrap_or(0),
                    f.get("vcpus").and_then(as_int).unwrap_or(0),
                    display_name(f),
                )
            })
            .filter(|(ram, disk, _, _)| *ram >= min_ram && *disk >= min_disk)
            .min()
            .map(|(_, _, _, name)| name)
            .unwrap_or_else(|| "none".to_string())
    }

    fn image_rows(&self) -> Vec<ImageRow> {
        sorted_by_name(self.snapshot.images.iter())
            .into_iter()
            .map(|image| {
                let min_ram = image.get("min_ram").and_then(as_int).unwrap_or(0);
                let min_disk = image.get("min_disk").and_then(as_int).unwrap_or(0);
                let size_bytes = image.get("size").and_then(as_int).unwrap_or(0);
                let visibility = match image.get("visibility").or_else(|| image.get("is_public")) {
                    Some(Value::Bool(true)) => "public".to_string(),
                    Some(Value::Bool(false)) => "private".to_string(),
                    Some(v) => display_scalar(v),
                    None => "-".to_string(),
                };
                ImageRow {
                    name: display_name(image),
                    status: upper_or_dash(str_of(image, "status")),
                    disk_format: or_dash(opt_str(image, "disk_format")),
                    container_format: or_dash(opt_str(image, "container_format")),
                    size_mb: (size_bytes as f64 / (1024.0 * 1024.0)).round() as i64,
                    visibility,
                    min_ram,
                    min_disk,
                    min_flavor: self.min_flavor_for(min_ram, min_disk),
                }
            })
            .collect()
    }

    fn keypair_rows(&self) -> Vec<KeypairRow> {
        sorted_by_name(self.snapshot.keypairs.iter())
            .into_iter()
            .map(|key| KeypairRow {
                name: display_name(key),
                key_type: or_dash(str_field(key, &attrs::KEY_TYPE)),
            })
            .collect()
    }

    fn server_image(&self, server: &Value) -> String {
        match server.get("image") {
            Some(image @ Value::Object(_)) => match opt_str(image, "id") {
                Some(id) => self.resolver.name_or_id(ResourceType::Image, id),
                None => "-".to_string(),
            },
            Some(Value::String(id)) if !id.is_empty() => self.resolver.name_or_id(ResourceType::Image, id),
            _ => "volume-boot".to_string(),
        }
    }

    fn server_flavor(&self, server: &Value) -> String {
        let Some(flavor) = server.get("flavor") else {
            return "-".to_string();
        };
        match opt_str(flavor, "id") {
            Some(id) if self.resolver.index().contains(ResourceType::Flavor, id) => {
                self.resolver.name_or_id(ResourceType::Flavor, id)
            }
            _ => or_dash(opt_str(flavor, "original_name").or_else(|| opt_str(flavor, "id"))),
        }
    }

    fn instance_rows(&self) -> Vec<InstanceRow> {
        let mut ports_by_server: HashMap<&str, Vec<&Value>> = HashMap::new();
        for port in self.snapshot.ports.iter() {
            if let Some(device_id) = opt_str(port, "device_id") {
                ports_by_server.entry(device_id).or_default().push(port);
            }
        }

        let mut volumes_by_server: HashMap<&str, Vec<&Value>> = HashMap::new();
        for volume in self.snapshot.volumes.iter() {
            for attachment in array_of(volume, "attachments") {
                if let Some(server_id) = str_field(attachment, &attrs::ATTACHMENT_SERVER) {
                    volumes_by_server.entry(server_id).or_default().push(volume);
                }
            }
        }

        let live = self.snapshot.servers.iter().filter(|s| is_live_server(s));
        sorted_by_name(live)
            .into_iter()
            .map(|server| {
                let id = str_of(server, "id");
                let ports = ports_by_server.get(id).map(|v| v.as_slice()).unwrap_or(&[]);

                let mut security_groups = BTreeSet::new();
                let mut port_bits = Vec::new();
                for port in ports {
                    for sg in security_group_ids(port) {
                        security_groups.insert(self.resolver.name_or_id(ResourceType::SecurityGroup, &sg));
                    }
                    let fip = self
                        .floating_ips
                        .for_port(str_of(port, "id"))
                        .first()
                        .map(|f| format!(" (fip:{})", or_dash(opt_str(f, "floating_ip_address"))))
                        .unwrap_or_default();
                    for fixed in array_of(port, "fixed_ips") {
                        port_bits.push(format!(
                            "{} {}{}",
                            self.subnet_path(fixed).unwrap_or_else(|| "-/-".to_string()),
                            str_of(fixed, "ip_address"),
                            fip
                        ));
                    }
                }

                let volumes = volumes_by_server
                    .get(id)
                    .map(|vols| {
                        vols.iter()
                            .map(|v| format!("{}:{}GB", display_name(v), v.get("size").and_then(as_int).unwrap_or(0)))
                            .collect()
                    })
                    .unwrap_or_default();

                InstanceRow {
                    name: display_name(server),
                    status: upper_or_dash(str_of(server, "status")),
                    vm_state: or_dash(str_field(server, &attrs::VM_STATE)),
                    power_state: power_state_name(int_field(server, &attrs::POWER_STATE)),
                    host: or_dash(str_field(server, &attrs::SERVER_HOST)),
                    image: self.server_image(server),
                    flavor: self.server_flavor(server),
                    key_name: or_dash(opt_str(server, "key_name")),
                    ports: port_bits,
                    volumes,
                    security_groups: security_groups.into_iter().collect(),
                }
            })
            .collect()
    }

    fn volume_rows(&self) -> Vec<VolumeRow> {
        let backups_available = self.snapshot.backups.available;
        let count_for = |records: &[Value], volume_id: &str| {
            records
                .iter()
                .filter(|r| str_of(r, "volume_id") == volume_id)
                .count()
        };

        sorted_by_name(self.snapshot.volumes.iter())
            .into_iter()
            .map(|volume| {
                let id = str_of(volume, "id");
                VolumeRow {
                    name: display_name(volume),
                    volume_type: or_dash(opt_str(volume, "volume_type")),
                    size_gb: volume.get("size").and_then(as_int).unwrap_or(0),
                    status: upper_or_dash(str_of(volume, "status")),
                    backend: backend_from_host(str_field(volume, &attrs::VOLUME_HOST)),
                    attached_to: array_of(volume, "attachments")
                        .iter()
                        .map(|a| match str_field(a, &attrs::ATTACHMENT_SERVER) {
                            Some(server_id) => self.resolver.name_or_id(ResourceType::Server, server_id),
                            None => "-".to_string(),
                        })
                        .collect(),
                    snapshots: count_for(&self.snapshot.snapshots.items, id),
                    backups: backups_available.then(|| count_for(&self.snapshot.backups.items, id)),
                }
            })
            .collect()
    }
}
