//! Point-in-time snapshot of every collection a report needs
//!
//! All collections are fetched concurrently and the snapshot is only handed
//! out once every request has finished, so indexing always sees the complete
//! set. A failed fetch becomes an empty, unavailable collection.

use crate::cloud::auth::IdentityInfo;
use crate::graph::ResourceType;
use crate::resource::{fetch_or_empty, Collection, Fetcher, ResourceFilter};

#[derive(Debug, Default)]
pub struct Snapshot {
    pub project_id: Option<String>,
    pub identity: IdentityInfo,
    pub networks: Collection,
    pub subnets: Collection,
    pub routers: Collection,
    pub ports: Collection,
    pub security_groups: Collection,
    pub security_group_rules: Collection,
    pub floating_ips: Collection,
    pub trunks: Collection,
    pub qos_policies: Collection,
    pub load_balancers: Collection,
    pub servers: Collection,
    pub flavors: Collection,
    pub images: Collection,
    pub keypairs: Collection,
    pub volumes: Collection,
    pub snapshots: Collection,
    pub backups: Collection,
}

impl Snapshot {
    pub async fn fetch<F: Fetcher + ?Sized>(fetcher: &F, project_id: Option<&str>, identity: IdentityInfo) -> Self {
        let project: Vec<ResourceFilter> = project_id
            .map(|id| vec![ResourceFilter::new("project_id", vec![id.to_string()])])
            .unwrap_or_default();
        let all: &[ResourceFilter] = &[];

        tracing::debug!("Fetching snapshot for project {:?}", project_id);

        let (
            (networks, subnets, routers, ports, security_groups, security_group_rules),
            (floating_ips, trunks, qos_policies, load_balancers),
            (servers, flavors, images, keypairs),
            (volumes, snapshots, backups),
        ) = futures::join!(
            async {
                futures::join!(
                    fetch_or_empty(fetcher, "networks", all),
                    fetch_or_empty(fetcher, "subnets", all),
                    fetch_or_empty(fetcher, "routers", &project),
                    fetch_or_empty(fetcher, "ports", &project),
                    fetch_or_empty(fetcher, "security-groups", &project),
                    fetch_or_empty(fetcher, "security-group-rules", all),
                )
            },
            async {
                futures::join!(
                    fetch_or_empty(fetcher, "floating-ips", &project),
                    fetch_or_empty(fetcher, "trunks", all),
                    fetch_or_empty(fetcher, "qos-policies", all),
                    fetch_or_empty(fetcher, "load-balancers", all),
                )
            },
            async {
                futures::join!(
                    fetch_or_empty(fetcher, "servers", all),
                    fetch_or_empty(fetcher, "flavors", all),
                    fetch_or_empty(fetcher, "images", all),
                    fetch_or_empty(fetcher, "keypairs", all),
                )
            },
            async {
                futures::join!(
                    fetch_or_empty(fetcher, "volumes", all),
                    fetch_or_empty(fetcher, "snapshots", all),
                    fetch_or_empty(fetcher, "backups", all),
                )
            },
        );

        Self {
            project_id: project_id.map(|s| s.to_string()),
            identity,
            networks,
            subnets,
            routers,
            ports,
            security_groups,
            security_group_rules,
            floating_ips,
            trunks,
            qos_policies,
            load_balancers,
            servers,
            flavors,
            images,
            keypairs,
            volumes,
            snapshots,
            backups,
        }
    }

    /// The collection holding records of `kind`
    pub fn collection(&self, kind: ResourceType) -> &Collection {
        match kind {
            ResourceType::Network => &self.networks,
            ResourceType::Subnet => &self.subnets,
            ResourceType::Router => &self.routers,
            ResourceType::Port => &self.ports,
            ResourceType::SecurityGroup => &self.security_groups,
            ResourceType::FloatingIp => &self.floating_ips,
            ResourceType::Trunk => &self.trunks,
            ResourceType::QosPolicy => &self.qos_policies,
            ResourceType::LoadBalancer => &self.load_balancers,
            ResourceType::Server => &self.servers,
            ResourceType::Flavor => &self.flavors,
            ResourceType::Image => &self.images,
            ResourceType::Volume => &self.volumes,
            ResourceType::Snapshot => &self.snapshots,
            ResourceType::Backup => &self.backups,
        }
    }
}
