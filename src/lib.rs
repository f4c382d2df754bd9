//! osview: read-only OpenStack project overview and port diagnostics
//!
//! - [`cloud`] - Keystone authentication, service catalog, HTTP
//! - [`resource`] - the [`resource::Fetcher`] seam and the collection registry
//! - [`snapshot`] - one concurrent fetch of every collection a report needs
//! - [`graph`] - identifier index, name resolution, port and overview rows
//! - [`usage`] - quota usage reconciled from several APIs
//! - [`report`] - table, JSON, CSV and overview text output
//! - [`config`] - `clouds.yaml`, `OS_*` variables and preferences

pub mod cloud;
pub mod config;
pub mod graph;
pub mod report;
pub mod resource;
pub mod snapshot;
pub mod usage;

/// Version injected at compile time via OSVIEW_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("OSVIEW_VERSION") {
    Some(v) => v,
    None => "dev",
};
