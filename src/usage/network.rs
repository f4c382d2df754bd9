//! Networking usage
//!
//! Used counts come from the quota details extension when it reports all six
//! resources, else from counting the snapshot. Limits come from the details,
//! else the plain quota, else they are unbounded.

use super::{owned_by, pick_limit, Limit, QuotaLine, ServiceUsage, UsageSource};
use crate::graph::attrs::{self, as_int, bool_field};
use crate::resource::{show_or_none, Fetcher};
use crate::snapshot::Snapshot;
use serde_json::Value;

/// `(label, quota key, alternate quota key)`
pub const NETWORK_QUOTAS: [(&str, &str, &str); 6] = [
    ("networks", "network", "networks"),
    ("subnets", "subnet", "subnets"),
    ("routers", "router", "routers"),
    ("ports", "port", "ports"),
    ("secgroups", "security_group", "security_groups"),
    ("fips", "floatingip", "floating_ips"),
];

/// Tier 1: `used` of every resource in the quota details
pub fn try_quota_details(details: &Value) -> Option<[i64; 6]> {
    let mut used = [0; 6];
    for (slot, (_, key, _)) in used.iter_mut().zip(NETWORK_QUOTAS.iter()) {
        *slot = details.get(*key)?.get("used").and_then(as_int)?;
    }
    Some(used)
}

/// Tier 2: count what the snapshot holds for the project
pub fn count_from_snapshot(snapshot: &Snapshot) -> [i64; 6] {
    let project = snapshot.project_id.as_deref();
    let networks = snapshot
        .networks
        .iter()
        .filter(|n| owned_by(n, project) && !bool_field(n, &attrs::ROUTER_EXTERNAL).unwrap_or(false))
        .count();
    let subnets = snapshot.subnets.iter().filter(|s| owned_by(s, project)).count();

    [
        networks,
        subnets,
        snapshot.routers.len(),
        snapshot.ports.len(),
        snapshot.security_groups.len(),
        snapshot.floating_ips.len(),
    ]
    .map(|n| n as i64)
}

fn limit_for(details: Option<&Value>, quota: Option<&Value>, key: &str, alt: &str) -> Limit {
    details
        .and_then(|d| pick_limit(d, key))
        .or_else(|| {
            let quota = quota?;
            pick_limit(quota, key).or_else(|| pick_limit(quota, alt))
        })
        .unwrap_or(Limit::Unbounded)
}

/// Reconcile networking usage for the snapshot's project
pub async fn reconcile_network<F: Fetcher + ?Sized>(fetcher: &F, snapshot: &Snapshot) -> ServiceUsage {
    let project_id = snapshot.project_id.as_deref().unwrap_or_default();
    let details = show_or_none(fetcher, "network-quota-details", project_id).await;

    let (used, source) = match details.as_ref().and_then(try_quota_details) {
        Some(used) => (used, UsageSource::QuotaDetails),
        None => (count_from_snapshot(snapshot), UsageSource::Enumeration),
    };
    tracing::debug!("Network usage from {}", source);

    // The details carry limits too; the plain quota is only needed without them
    let quota = if details.is_some() {
        None
    } else {
        show_or_none(fetcher, "network-quota", project_id).await
    };

    let lines = NETWORK_QUOTAS
        .iter()
        .zip(used)
        .map(|(&(label, key, alt), used)| {
            QuotaLine::new(label, used, limit_for(details.as_ref(), quota.as_ref(), key, alt))
        })
        .collect();

    ServiceUsage {
        service: "network",
        source,
        lines,
    }
}
