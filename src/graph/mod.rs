//! Resource graph
//!
//! Cross-references one [`Snapshot`] into resolved rows. A [`Topology`] owns
//! every per-run cache (identifier index, trunk roles, floating IPs by port)
//! and is dropped together with the report it produced.
//!
//! - [`index`] - `id -> record` and `name -> {ids}` per resource type
//! - [`resolver`] - ambiguity-aware name resolution
//! - [`ports`] - port binding, trunk roles and port rows
//! - [`overview`] - rows for the project overview sections
//! - [`attrs`] - fallback key tables for attributes with several spellings

pub mod attrs;
pub mod index;
pub mod kind;
pub mod overview;
pub mod ports;
pub mod resolver;

pub use index::ResourceIndex;
pub use kind::ResourceType;
pub use overview::Overview;
pub use ports::{BindingKind, PortBinding, PortRow, TrunkRole};
pub use resolver::NameResolver;

use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use ports::{FloatingIpIndex, PortAssembler, TrunkIndex};

/// Indexed in this order; optional extensions last so their absence never
/// affects the core collections
const INDEX_ORDER: [ResourceType; 15] = [
    ResourceType::Network,
    ResourceType::Subnet,
    ResourceType::Router,
    ResourceType::Port,
    ResourceType::SecurityGroup,
    ResourceType::FloatingIp,
    ResourceType::Server,
    ResourceType::Flavor,
    ResourceType::Image,
    ResourceType::Volume,
    ResourceType::Snapshot,
    ResourceType::Backup,
    ResourceType::Trunk,
    ResourceType::QosPolicy,
    ResourceType::LoadBalancer,
];

pub struct Topology<'s> {
    snapshot: &'s Snapshot,
    resolver: NameResolver,
    trunks: TrunkIndex,
    floating_ips: FloatingIpIndex,
}

impl<'s> Topology<'s> {
    pub fn new(snapshot: &'s Snapshot) -> Self {
        let mut resolver = NameResolver::default();
        for kind in INDEX_ORDER {
            let collection = snapshot.collection(kind);
            if !collection.available {
                resolver.mark_unavailable(kind);
            }
            resolver.load(kind, collection.iter());
        }

        let trunks = TrunkIndex::build(snapshot.trunks.iter(), &resolver);
        let floating_ips = FloatingIpIndex::build(snapshot.floating_ips.iter());

        tracing::debug!(
            "Indexed {} ports, {} servers, {} networks",
            resolver.index().len(ResourceType::Port),
            resolver.index().len(ResourceType::Server),
            resolver.index().len(ResourceType::Network)
        );

        Self {
            snapshot,
            resolver,
            trunks,
            floating_ips,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.snapshot
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// One resolved row per port in the snapshot, in fetch order
    pub fn port_rows(&self, now: DateTime<Utc>) -> Vec<PortRow> {
        PortAssembler::new(&self.resolver, &self.trunks, &self.floating_ips, now).rows(self.snapshot.ports.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Collection;
    use serde_json::json;

    #[test]
    fn test_unavailable_collections_are_flagged() {
        let snapshot = Snapshot {
            ports: Collection::available(vec![json!({"id": "p1", "device_owner": "octavia", "device_id": "lb1"})]),
            load_balancers: Collection::unavailable(),
            qos_policies: Collection::available(vec![]),
            ..Default::default()
        };
        let topology = Topology::new(&snapshot);
        assert!(!topology.resolver().is_available(ResourceType::LoadBalancer));
        assert!(topology.resolver().is_available(ResourceType::QosPolicy));

        let rows = topology.port_rows(Utc::now());
        assert_eq!(rows[0].bound_to, "lb1");
        assert_eq!(rows[0].binding.kind(), Some(BindingKind::LoadBalancer));
    }

    #[test]
    fn test_trunk_roles_reach_port_rows() {
        let snapshot = Snapshot {
            ports: Collection::available(vec![json!({"id": "parent"}), json!({"id": "child"})]),
            trunks: Collection::available(vec![json!({
                "id": "t1", "name": "trunk-1", "port_id": "parent",
                "sub_ports": [{"port_id": "child", "segmentation_type": "vlan", "segmentation_id": 7}]
            })]),
            ..Default::default()
        };
        let topology = Topology::new(&snapshot);
        let rows = topology.port_rows(Utc::now());
        assert_eq!(rows[0].trunk, "TRUNK-PARENT trunk-1 (subports=1)");
        assert_eq!(rows[1].trunk, "TRUNK-SUBPORT of trunk-1 [vlan:7]");
    }
}
