//! OpenStack API interaction module
//!
//! This module provides the core functionality for talking to an OpenStack
//! deployment: Keystone authentication, the service catalog, and the HTTP
//! client used by the resource fetcher.
//!
//! # Module Structure
//!
//! - [`auth`] - Keystone v3 authentication and token caching
//! - [`client`] - Main client resolving service endpoints from the catalog
//! - [`error`] - The fetch error type seen by the report core
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use osview::cloud::client::CloudClient;
//!
//! async fn example(profile: osview::config::CloudProfile) -> anyhow::Result<()> {
//!     let client = CloudClient::new(profile)?;
//!     let url = client.service_url("network", "v2.0/ports").await?;
//!     let ports = client.get(&url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;

pub use error::CloudError;
