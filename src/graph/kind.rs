//! Resource types known to the index

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Network,
    Subnet,
    Router,
    Port,
    SecurityGroup,
    FloatingIp,
    Trunk,
    QosPolicy,
    LoadBalancer,
    Server,
    Flavor,
    Image,
    Volume,
    Snapshot,
    Backup,
}

impl ResourceType {
    pub const ALL: [ResourceType; 15] = [
        Self::Network,
        Self::Subnet,
        Self::Router,
        Self::Port,
        Self::SecurityGroup,
        Self::FloatingIp,
        Self::Trunk,
        Self::QosPolicy,
        Self::LoadBalancer,
        Self::Server,
        Self::Flavor,
        Self::Image,
        Self::Volume,
        Self::Snapshot,
        Self::Backup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::Router => "router",
            Self::Port => "port",
            Self::SecurityGroup => "security_group",
            Self::FloatingIp => "floating_ip",
            Self::Trunk => "trunk",
            Self::QosPolicy => "qos_policy",
            Self::LoadBalancer => "loadbalancer",
            Self::Server => "server",
            Self::Flavor => "flavor",
            Self::Image => "image",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
            Self::Backup => "backup",
        }
    }

    /// Registry key of the collection holding this type
    pub fn resource_key(&self) -> &'static str {
        match self {
            Self::Network => "networks",
            Self::Subnet => "subnets",
            Self::Router => "routers",
            Self::Port => "ports",
            Self::SecurityGroup => "security-groups",
            Self::FloatingIp => "floating-ips",
            Self::Trunk => "trunks",
            Self::QosPolicy => "qos-policies",
            Self::LoadBalancer => "load-balancers",
            Self::Server => "servers",
            Self::Flavor => "flavors",
            Self::Image => "images",
            Self::Volume => "volumes",
            Self::Snapshot => "snapshots",
            Self::Backup => "backups",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
