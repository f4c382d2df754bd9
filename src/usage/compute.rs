//! Compute usage
//!
//! Used instances, cores and RAM come from the first of three sources that
//! yields all three values:
//!
//! 1. `totalInstancesUsed`/`totalCoresUsed`/`totalRAMUsed` from absolute limits
//! 2. the `*_in_use` values of the quota set with usage detail
//! 3. the live servers of the snapshot, sized by their flavors
//!
//! The second source is only fetched when the first fails, and flavors are
//! only fetched one by one when the first two both fail.

use super::{pick_in_use, pick_limit, Limit, QuotaLine, ServiceUsage, UsageSource};
use crate::graph::attrs::as_int;
use crate::graph::index::record_id;
use crate::graph::overview::is_live_server;
use crate::resource::{show_or_none, Fetcher};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComputeUsage {
    pub instances: i64,
    pub cores: i64,
    pub ram_mb: i64,
}

impl ComputeUsage {
    pub fn new(instances: i64, cores: i64, ram_mb: i64) -> Self {
        Self {
            instances,
            cores,
            ram_mb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputeMaxima {
    pub instances: Limit,
    pub cores: Limit,
    pub ram_mb: Limit,
}

impl Default for ComputeMaxima {
    fn default() -> Self {
        Self {
            instances: Limit::Unbounded,
            cores: Limit::Unbounded,
            ram_mb: Limit::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComputeReport {
    pub used: ComputeUsage,
    pub source: UsageSource,
    pub maxima: ComputeMaxima,
}

impl ComputeReport {
    pub fn service_usage(&self) -> ServiceUsage {
        ServiceUsage {
            service: "compute",
            source: self.source,
            lines: vec![
                QuotaLine::new("instances", self.used.instances, self.maxima.instances),
                QuotaLine::new("vcpus", self.used.cores, self.maxima.cores),
                QuotaLine::new("ram", self.used.ram_mb, self.maxima.ram_mb),
            ],
        }
    }
}

/// The `absolute` block of a limits document, or the document itself
fn absolute(limits: &Value) -> &Value {
    limits.get("absolute").unwrap_or(limits)
}

/// Tier 1: all three `total*Used` values present and non-null
pub fn try_absolute_limits(limits: &Value) -> Option<ComputeUsage> {
    let abs = absolute(limits);
    let get = |key: &str| abs.get(key).and_then(as_int);
    Some(ComputeUsage::new(
        get("totalInstancesUsed")?,
        get("totalCoresUsed")?,
        get("totalRAMUsed")?,
    ))
}

/// Tier 2: `instances`, `cores` and `ram` usage all readable from the quota set
pub fn try_quota_usage(quota_set: &Value) -> Option<ComputeUsage> {
    Some(ComputeUsage::new(
        pick_in_use(quota_set, "instances")?,
        pick_in_use(quota_set, "cores")?,
        pick_in_use(quota_set, "ram")?,
    ))
}

/// Flavors by id for one reconciliation run. Seeded from the flavor
/// collection; lookups that fail are remembered as misses.
#[derive(Debug, Default)]
pub struct FlavorCache {
    by_id: HashMap<String, Option<Value>>,
}

impl FlavorCache {
    pub fn seeded<'a, I>(flavors: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let by_id = flavors
            .into_iter()
            .filter_map(|f| record_id(f).map(|id| (id.to_string(), Some(f.clone()))))
            .collect();
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.by_id.get(id).and_then(|f| f.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn insert(&mut self, id: &str, flavor: Option<Value>) {
        self.by_id.insert(id.to_string(), flavor);
    }

    /// Fetch every flavor id in `ids` not seen before
    pub async fn fill<F: Fetcher + ?Sized>(&mut self, fetcher: &F, ids: impl IntoIterator<Item = String>) {
        for id in ids {
            if self.contains(&id) {
                continue;
            }
            let flavor = show_or_none(fetcher, "flavor", &id).await;
            if flavor.is_none() {
                tracing::debug!("Flavor {} could not be resolved", id);
            }
            self.insert(&id, flavor);
        }
    }
}

fn embedded_flavor(server: &Value) -> Option<&Value> {
    server.get("flavor").filter(|f| f.is_object())
}

/// vCPUs and RAM of one server; embedded flavor values first, then the cache
fn server_size(server: &Value, cache: &FlavorCache) -> (i64, i64) {
    let embedded = embedded_flavor(server);
    let from_embedded = |key: &str| embedded.and_then(|f| f.get(key)).and_then(as_int);
    let cached = embedded
        .and_then(|f| f.get("id"))
        .and_then(|id| id.as_str())
        .and_then(|id| cache.get(id));
    let from_cache = |key: &str| cached.and_then(|f| f.get(key)).and_then(as_int);

    let vcpus = from_embedded("vcpus").or_else(|| from_cache("vcpus")).unwrap_or(0);
    let ram = from_embedded("ram").or_else(|| from_cache("ram")).unwrap_or(0);
    (vcpus, ram)
}

/// Flavor ids that tier 3 needs but the embedded payloads do not cover
pub fn missing_flavor_ids(servers: &[Value], cache: &FlavorCache) -> BTreeSet<String> {
    servers
        .iter()
        .filter(|s| is_live_server(s))
        .filter_map(|server| {
            let flavor = embedded_flavor(server)?;
            let complete = ["vcpus", "ram"]
                .iter()
                .all(|key| flavor.get(*key).and_then(as_int).is_some());
            if complete {
                return None;
            }
            let id = flavor.get("id")?.as_str()?;
            (!id.is_empty() && !cache.contains(id)).then(|| id.to_string())
        })
        .collect()
}

/// Tier 3, pure part: count live servers and sum their sizes
pub fn sum_servers(servers: &[Value], cache: &FlavorCache) -> ComputeUsage {
    servers
        .iter()
        .filter(|s| is_live_server(s))
        .fold(ComputeUsage::default(), |acc, server| {
            let (vcpus, ram) = server_size(server, cache);
            ComputeUsage::new(acc.instances + 1, acc.cores + vcpus, acc.ram_mb + ram)
        })
}

/// Tier 3: never fails. Unknown flavors are fetched once into the cache;
/// servers whose flavor stays unknown count as an instance of size zero.
pub async fn from_server_enumeration<F: Fetcher + ?Sized>(
    fetcher: &F,
    servers: &[Value],
    cache: &mut FlavorCache,
) -> ComputeUsage {
    let missing = missing_flavor_ids(servers, cache);
    cache.fill(fetcher, missing).await;
    sum_servers(servers, cache)
}

/// Maxima from the quota set, else from the absolute limits
pub fn maxima_from(quota_set: Option<&Value>, limits: Option<&Value>) -> ComputeMaxima {
    if let Some(quota) = quota_set {
        return ComputeMaxima {
            instances: pick_limit(quota, "instances").unwrap_or(Limit::Unbounded),
            cores: pick_limit(quota, "cores").unwrap_or(Limit::Unbounded),
            ram_mb: pick_limit(quota, "ram").unwrap_or(Limit::Unbounded),
        };
    }
    match limits.map(absolute) {
        Some(abs) => ComputeMaxima {
            instances: Limit::from_value(abs.get("maxTotalInstances")),
            cores: Limit::from_value(abs.get("maxTotalCores")),
            ram_mb: Limit::from_value(abs.get("maxTotalRAMSize")),
        },
        None => ComputeMaxima::default(),
    }
}

/// Reconcile compute usage for one project
pub async fn reconcile_compute<F: Fetcher + ?Sized>(
    fetcher: &F,
    project_id: &str,
    servers: &[Value],
    flavors: &[Value],
) -> ComputeReport {
    let limits = show_or_none(fetcher, "compute-limits", project_id).await;

    let (used, source) = match limits.as_ref().and_then(try_absolute_limits) {
        Some(used) => (used, UsageSource::AbsoluteLimits),
        None => {
            let quota_usage = show_or_none(fetcher, "compute-quota-usage", project_id).await;
            match quota_usage.as_ref().and_then(try_quota_usage) {
                Some(used) => (used, UsageSource::QuotaUsage),
                None => {
                    let mut cache = FlavorCache::seeded(flavors);
                    let used = from_server_enumeration(fetcher, servers, &mut cache).await;
                    (used, UsageSource::Enumeration)
                }
            }
        }
    };
    tracing::debug!("Compute usage from {}: {:?}", source, used);

    let quota_set = show_or_none(fetcher, "compute-quota-set", project_id).await;
    let maxima = maxima_from(quota_set.as_ref(), limits.as_ref());

    ComputeReport { used, source, maxima }
}
