//! Resource abstraction layer
//!
//! This module provides a data-driven approach to fetching OpenStack
//! collections. Resource definitions are loaded from JSON at compile time, so
//! a new collection is a registry entry rather than new code.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`fetcher`] - The [`Fetcher`] seam, paginated REST fetching, and the
//!   degrade-to-empty helpers
//! - [`memory`] - In-memory fetcher for replay files
//!
//! # Example
//!
//! ```ignore
//! use osview::resource::{fetch_or_empty, ResourceFilter};
//!
//! async fn project_ports(client: &osview::cloud::client::CloudClient, project: &str) {
//!     let filters = [ResourceFilter::new("project_id", vec![project.to_string()])];
//!     let ports = fetch_or_empty(client, "ports", &filters).await;
//!     println!("{} ports", ports.len());
//! }
//! ```

pub mod fetcher;
pub mod memory;
mod registry;

pub use fetcher::{fetch_or_empty, show_or_none, Collection, Fetcher, ResourceFilter};
pub use memory::MemoryFetcher;
pub use registry::*;
