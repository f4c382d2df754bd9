//! Block storage usage
//!
//! Used values come from the quota set with usage when it reports all four
//! resources, else from counting the snapshot (volume sizes summed for
//! gigabytes). Backups are `n/a` when neither source can describe them.

use super::{pick_in_use, pick_limit, Limit, QuotaLine, ServiceUsage, UsageSource};
use crate::graph::attrs::as_int;
use crate::resource::{show_or_none, Fetcher};
use crate::snapshot::Snapshot;
use serde_json::Value;

/// `(label, quota key)`
pub const VOLUME_QUOTAS: [(&str, &str); 4] = [
    ("vols", "volumes"),
    ("snaps", "snapshots"),
    ("backups", "backups"),
    ("gib", "gigabytes"),
];

/// Tier 1: `in_use` of every resource in the quota set
pub fn try_volume_quota_usage(quota_set: &Value) -> Option<[i64; 4]> {
    let mut used = [0; 4];
    for (slot, (_, key)) in used.iter_mut().zip(VOLUME_QUOTAS.iter()) {
        *slot = pick_in_use(quota_set, key)?;
    }
    Some(used)
}

/// Tier 2: counts from the snapshot; backups are `None` when the backup
/// API was unavailable
pub fn count_from_snapshot(snapshot: &Snapshot) -> [Option<i64>; 4] {
    let gigabytes: i64 = snapshot
        .volumes
        .iter()
        .filter_map(|v| v.get("size").and_then(as_int))
        .sum();
    [
        Some(snapshot.volumes.len() as i64),
        Some(snapshot.snapshots.len() as i64),
        snapshot
            .backups
            .available
            .then_some(snapshot.backups.len() as i64),
        Some(gigabytes),
    ]
}

/// Reconcile block storage usage for the snapshot's project
pub async fn reconcile_volume<F: Fetcher + ?Sized>(fetcher: &F, snapshot: &Snapshot) -> ServiceUsage {
    let project_id = snapshot.project_id.as_deref().unwrap_or_default();
    let usage = show_or_none(fetcher, "volume-quota-usage", project_id).await;

    let (used, source) = match usage.as_ref().and_then(try_volume_quota_usage) {
        Some(used) => (used.map(Some), UsageSource::QuotaUsage),
        None => (count_from_snapshot(snapshot), UsageSource::Enumeration),
    };
    tracing::debug!("Block storage usage from {}", source);

    let quota = show_or_none(fetcher, "volume-quota-set", project_id).await;
    let limit_for = |key: &str| {
        usage
            .as_ref()
            .and_then(|u| pick_limit(u, key))
            .or_else(|| quota.as_ref().and_then(|q| pick_limit(q, key)))
            .unwrap_or(Limit::Unbounded)
    };

    let lines = VOLUME_QUOTAS
        .iter()
        .zip(used)
        .map(|(&(label, key), used)| match used {
            Some(used) => QuotaLine::new(label, used, limit_for(key)),
            None => QuotaLine::not_available(label),
        })
        .collect();

    ServiceUsage {
        service: "volume",
        source,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Collection, MemoryFetcher};
    use serde_json::json;

    fn snapshot(backups: Collection) -> Snapshot {
        Snapshot {
            project_id: Some("p1".into()),
            volumes: Collection::available(vec![json!({"id": "v1", "size": 10}), json!({"id": "v2", "size": 40})]),
            snapshots: Collection::available(vec![json!({"id": "s1", "volume_id": "v1"})]),
            backups,
            ..Default::default()
        }
    }

    #[test]
    fn test_quota_usage_tier() {
        let fetcher = MemoryFetcher::new().with_document(
            "volume-quota-usage",
            json!({
                "volumes": {"in_use": 3, "limit": 10},
                "snapshots": {"in_use": 1, "limit": 10},
                "backups": {"in_use": 0, "limit": -1},
                "gigabytes": {"in_use": 60, "limit": 1000}
            }),
        );
        let usage = tokio_test::block_on(reconcile_volume(&fetcher, &snapshot(Collection::unavailable())));

        assert_eq!(usage.source, UsageSource::QuotaUsage);
        let ratios: Vec<String> = usage.lines.iter().map(|l| l.ratio()).collect();
        assert_eq!(ratios, vec!["3/10", "1/10", "0/∞", "60/1000"]);
    }

    #[test]
    fn test_enumeration_without_backups() {
        let fetcher = MemoryFetcher::new().with_document("volume-quota-set", json!({"volumes": 10, "gigabytes": 100}));
        let usage = tokio_test::block_on(reconcile_volume(&fetcher, &snapshot(Collection::unavailable())));

        assert_eq!(usage.source, UsageSource::Enumeration);
        let ratios: Vec<String> = usage.lines.iter().map(|l| l.ratio()).collect();
        assert_eq!(ratios, vec!["2/10", "1/∞", "n/a/n/a", "50/100"]);
    }

    #[test]
    fn test_enumeration_with_backups() {
        let fetcher = MemoryFetcher::new();
        let backups = Collection::available(vec![json!({"id": "b1", "volume_id": "v2"})]);
        let usage = tokio_test::block_on(reconcile_volume(&fetcher, &snapshot(backups)));
        assert_eq!(usage.line("backups").map(|l| l.ratio()), Some("1/∞".to_string()));
    }
}
