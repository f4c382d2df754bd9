//! OpenStack Client
//!
//! Main client for interacting with OpenStack APIs, combining Keystone
//! authentication, the service catalog and the HTTP layer.

use super::auth::{Credentials, IdentityInfo};
use super::error::CloudError;
use super::http::CloudHttpClient;
use crate::config::CloudProfile;
use serde_json::Value;
use url::Url;

/// Main OpenStack client
#[derive(Clone)]
pub struct CloudClient {
    pub credentials: Credentials,
    pub http: CloudHttpClient,
    pub interface: String,
    pub region: Option<String>,
}

impl CloudClient {
    /// Create a new client. Authentication happens lazily on the first request.
    pub fn new(profile: CloudProfile) -> Result<Self, CloudError> {
        let http = CloudHttpClient::new()?;
        let interface = profile
            .interface
            .clone()
            .unwrap_or_else(|| "public".to_string());
        let region = profile.region_name.clone();

        Ok(Self {
            credentials: Credentials::new(profile, http.clone()),
            http,
            interface,
            region,
        })
    }

    /// Identity (project, user, roles) of the current token
    pub async fn identity(&self) -> Result<IdentityInfo, CloudError> {
        Ok(self.credentials.session().await?.identity.clone())
    }

    /// Make an authenticated GET request
    pub async fn get(&self, url: &str) -> Result<Value, CloudError> {
        let token = self.credentials.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Endpoint root for a service, with any version suffix the registry
    /// paths already carry stripped off
    pub async fn endpoint(&self, service: &str) -> Result<Url, CloudError> {
        let session = self.credentials.session().await?;
        let raw = session
            .endpoint(service_types(service), &self.interface, self.region.as_deref())
            .ok_or_else(|| CloudError::Unsupported(format!("no {} endpoint in catalog", service)))?;
        normalize_endpoint(service, &raw)
    }

    /// Build a full URL for a path relative to a service endpoint
    pub async fn service_url(&self, service: &str, path: &str) -> Result<String, CloudError> {
        let base = self.endpoint(service).await?;
        join_url(&base, path)
    }
}

/// Catalog service types to try for a registry service name, in order
pub fn service_types(service: &str) -> &'static [&'static str] {
    match service {
        "compute" => &["compute"],
        "network" => &["network"],
        "volume" => &["block-storage", "volumev3", "volume"],
        "image" => &["image"],
        "load-balancer" => &["load-balancer"],
        "identity" => &["identity"],
        _ => &[],
    }
}

/// Strip the version suffixes that registry paths include themselves
/// (`v2.0/...` for networking, `v2/...` for image and load-balancer).
pub fn normalize_endpoint(service: &str, raw: &str) -> Result<Url, CloudError> {
    let mut base = raw.trim_end_matches('/').to_string();
    let suffixes: &[&str] = match service {
        "network" => &["/v2.0"],
        "image" | "load-balancer" => &["/v2", "/v2.0"],
        _ => &[],
    };
    for suffix in suffixes {
        if let Some(stripped) = base.strip_suffix(suffix) {
            base = stripped.to_string();
            break;
        }
    }
    base.push('/');

    Url::parse(&base).map_err(|e| CloudError::Transport(format!("invalid endpoint {}: {}", raw, e)))
}

/// Join a relative (or root-absolute, e.g. Glance `next` links) path
pub fn join_url(base: &Url, path: &str) -> Result<String, CloudError> {
    base.join(path)
        .map(|u| u.to_string())
        .map_err(|e| CloudError::Transport(format!("invalid path {}: {}", path, e)))
}
