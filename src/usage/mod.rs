//! Usage reconciliation
//!
//! Each quota-bearing service reports usage through several APIs that may be
//! missing or disagree. Every service tries its sources in a fixed order and
//! takes all used values from the first source that yields every one of
//! them; the last source is an enumeration of the snapshot and never fails.
//!
//! - [`compute`] - instances, cores, RAM
//! - [`network`] - networks, subnets, routers, ports, security groups, floating IPs
//! - [`volume`] - volumes, snapshots, backups, gigabytes

pub mod compute;
pub mod network;
pub mod volume;

use crate::graph::attrs::as_int;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub use compute::{reconcile_compute, ComputeReport, ComputeUsage};
pub use network::reconcile_network;
pub use volume::reconcile_volume;

/// A quota maximum. `-1`, `null` and a missing value all mean no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    Finite(i64),
    Unbounded,
}

impl Limit {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(as_int) {
            Some(n) if n >= 0 => Self::Finite(n),
            _ => Self::Unbounded,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{}", n),
            Self::Unbounded => f.write_str("∞"),
        }
    }
}

/// Where a set of used values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    AbsoluteLimits,
    QuotaUsage,
    QuotaDetails,
    Enumeration,
}

impl fmt::Display for UsageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AbsoluteLimits => "absolute limits",
            Self::QuotaUsage => "quota usage",
            Self::QuotaDetails => "quota details",
            Self::Enumeration => "enumeration",
        };
        f.write_str(name)
    }
}

/// One `used/limit` pair. `None` renders as `n/a` (the API behind it is
/// unavailable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaLine {
    pub label: &'static str,
    pub used: Option<i64>,
    pub limit: Option<Limit>,
}

impl QuotaLine {
    pub fn new(label: &'static str, used: i64, limit: Limit) -> Self {
        Self {
            label,
            used: Some(used),
            limit: Some(limit),
        }
    }

    pub fn not_available(label: &'static str) -> Self {
        Self {
            label,
            used: None,
            limit: None,
        }
    }

    /// `used/limit`, e.g. `3/10`, `3/∞` or `n/a/n/a`
    pub fn ratio(&self) -> String {
        let used = self.used.map(|u| u.to_string()).unwrap_or_else(|| "n/a".to_string());
        let limit = self.limit.map(|l| l.to_string()).unwrap_or_else(|| "n/a".to_string());
        format!("{}/{}", used, limit)
    }
}

/// Reconciled usage of one service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceUsage {
    pub service: &'static str,
    pub source: UsageSource,
    pub lines: Vec<QuotaLine>,
}

impl ServiceUsage {
    pub fn line(&self, label: &str) -> Option<&QuotaLine> {
        self.lines.iter().find(|l| l.label == label)
    }
}

/// Usage of `name` from a quota document. Tries, in order: a flat
/// `<name>_in_use`, a nested `{in_use}` or `{used}` object under `name`, and
/// `<name>_in_use` inside an `attributes` or `usage` sub-object.
pub fn pick_in_use(doc: &Value, name: &str) -> Option<i64> {
    let flat_key = format!("{}_in_use", name);

    if let Some(v) = doc.get(&flat_key).and_then(as_int) {
        return Some(v);
    }

    if let Some(nested) = doc.get(name).filter(|v| v.is_object()) {
        if let Some(v) = ["in_use", "used"]
            .iter()
            .find_map(|key| nested.get(*key).and_then(as_int))
        {
            return Some(v);
        }
    }

    ["attributes", "usage"]
        .iter()
        .filter_map(|key| doc.get(*key))
        .find_map(|sub| sub.get(&flat_key).and_then(as_int))
}

/// Maximum of `name` from a quota document: a plain number, or the `limit`
/// of a nested usage object
pub fn pick_limit(doc: &Value, name: &str) -> Option<Limit> {
    let value = doc.get(name)?;
    match value {
        Value::Object(_) => value.get("limit").map(|v| Limit::from_value(Some(v))),
        Value::Null => None,
        v => Some(Limit::from_value(Some(v))),
    }
}

/// Whether a record belongs to the given project
pub fn owned_by(record: &Value, project_id: Option<&str>) -> bool {
    let Some(project_id) = project_id else {
        return true;
    };
    ["project_id", "tenant_id"]
        .iter()
        .filter_map(|key| record.get(*key).and_then(|v| v.as_str()))
        .any(|owner| owner == project_id)
}
