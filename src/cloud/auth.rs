//! Keystone Authentication
//!
//! Handles v3 password and application-credential authentication, and keeps
//! the issued token together with the service catalog and the identity
//! (project, user, roles) that came back with it.

use super::error::CloudError;
use super::http::CloudHttpClient;
use crate::config::{AuthSettings, CloudProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the response carries no usable expiry
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// A `{id, name, domain}` reference as Keystone returns it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<Box<NamedRef>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: TokenInfo,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
    #[serde(default)]
    project: Option<NamedRef>,
    #[serde(default)]
    user: Option<NamedRef>,
    #[serde(default)]
    roles: Vec<NamedRef>,
}

/// Who the token belongs to, as shown in the report header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityInfo {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Everything one successful authentication yields
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub catalog: Vec<CatalogEntry>,
    pub identity: IdentityInfo,
}

impl Session {
    /// Find the endpoint URL for the first matching service type
    pub fn endpoint(&self, service_types: &[&str], interface: &str, region: Option<&str>) -> Option<String> {
        find_endpoint(&self.catalog, service_types, interface, region)
    }
}

struct CachedSession {
    session: Arc<Session>,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedSession {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Keystone credentials holder with token caching
#[derive(Clone)]
pub struct Credentials {
    profile: Arc<CloudProfile>,
    http: CloudHttpClient,
    cache: Arc<RwLock<Option<CachedSession>>>,
}

impl Credentials {
    pub fn new(profile: CloudProfile, http: CloudHttpClient) -> Self {
        Self {
            profile: Arc::new(profile),
            http,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn profile(&self) -> &CloudProfile {
        &self.profile
    }

    /// Get a valid session, authenticating when the cached one expired.
    /// Concurrent callers on a cold cache wait on the write lock and share
    /// the one token it produces.
    pub async fn session(&self) -> Result<Arc<Session>, CloudError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.session.clone());
            }
        }

        let mut cache = self.cache.write().await;
        match cache.as_ref() {
            Some(cached) if cached.is_valid() => return Ok(cached.session.clone()),
            Some(_) => tracing::debug!("Cached token expired, authenticating again"),
            None => {}
        }

        let (session, ttl) = self.authenticate().await?;
        *cache = Some(CachedSession {
            session: session.clone(),
            expires_at: Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER),
        });

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(session)
    }

    async fn authenticate(&self) -> Result<(Arc<Session>, Duration), CloudError> {
        let auth_url = self
            .profile
            .auth
            .auth_url
            .as_deref()
            .ok_or_else(|| CloudError::Auth("no auth_url configured".to_string()))?;
        let url = tokens_url(auth_url);
        let body = build_auth_request(&self.profile.auth)?;

        let (token, response) = self.http.post_auth(&url, &body).await?;
        let parsed: TokenBody = serde_json::from_value(response)?;

        let ttl = parsed
            .token
            .expires_at
            .as_deref()
            .and_then(|s| token_ttl(s, Utc::now()))
            .unwrap_or(DEFAULT_TOKEN_TTL);

        let session = Arc::new(Session {
            token,
            identity: identity_from(&parsed.token),
            catalog: parsed.token.catalog,
        });

        Ok((session, ttl))
    }

    /// Get the current token
    pub async fn get_token(&self) -> Result<String, CloudError> {
        Ok(self.session().await?.token.clone())
    }
}

/// Build `<auth_url>/v3/auth/tokens`, tolerating a versioned or bare auth URL
pub fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{}/auth/tokens", base)
    } else {
        format!("{}/v3/auth/tokens", base)
    }
}

/// Build the Keystone v3 auth request body
pub fn build_auth_request(auth: &AuthSettings) -> Result<Value, CloudError> {
    if let (Some(id), Some(secret)) = (
        auth.application_credential_id.as_deref(),
        auth.application_credential_secret.as_deref(),
    ) {
        // Application credentials are already scoped
        return Ok(json!({
            "auth": {
                "identity": {
                    "methods": ["application_credential"],
                    "application_credential": { "id": id, "secret": secret }
                }
            }
        }));
    }

    let Some(password) = auth.password.as_deref() else {
        return Err(CloudError::Auth(
            "no password or application credential configured".to_string(),
        ));
    };

    let user = match (auth.user_id.as_deref(), auth.username.as_deref()) {
        (Some(id), _) => json!({ "id": id, "password": password }),
        (None, Some(name)) => json!({
            "name": name,
            "domain": domain_ref(auth.user_domain_id.as_deref(), auth.user_domain_name.as_deref()),
            "password": password,
        }),
        (None, None) => {
            return Err(CloudError::Auth("no username or user_id configured".to_string()));
        }
    };

    let mut body = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": { "user": user }
            }
        }
    });

    let scope = match (auth.project_id.as_deref(), auth.project_name.as_deref()) {
        (Some(id), _) => Some(json!({ "project": { "id": id } })),
        (None, Some(name)) => Some(json!({
            "project": {
                "name": name,
                "domain": domain_ref(
                    auth.project_domain_id.as_deref(),
                    auth.project_domain_name.as_deref(),
                ),
            }
        })),
        (None, None) => None,
    };

    if let (Some(scope), Some(obj)) = (scope, body["auth"].as_object_mut()) {
        obj.insert("scope".to_string(), scope);
    }

    Ok(body)
}

fn domain_ref(id: Option<&str>, name: Option<&str>) -> Value {
    match (id, name) {
        (Some(id), _) => json!({ "id": id }),
        (None, Some(name)) => json!({ "name": name }),
        (None, None) => json!({ "id": "default" }),
    }
}

fn token_ttl(expires_at: &str, now: DateTime<Utc>) -> Option<Duration> {
    let expires = DateTime::parse_from_rfc3339(expires_at).ok()?;
    (expires.with_timezone(&Utc) - now).to_std().ok()
}

fn identity_from(token: &TokenInfo) -> IdentityInfo {
    let domain = token
        .project
        .as_ref()
        .and_then(|p| p.domain.as_ref())
        .and_then(|d| d.name.clone());

    IdentityInfo {
        domain,
        project: token.project.as_ref().and_then(|p| p.name.clone()),
        project_id: token.project.as_ref().and_then(|p| p.id.clone()),
        user: token.user.as_ref().and_then(|u| u.name.clone()),
        roles: token.roles.iter().filter_map(|r| r.name.clone()).collect(),
    }
}

fn find_endpoint(
    catalog: &[CatalogEntry],
    service_types: &[&str],
    interface: &str,
    region: Option<&str>,
) -> Option<String> {
    for service_type in service_types {
        let Some(entry) = catalog.iter().find(|e| e.service_type == *service_type) else {
            continue;
        };

        let found = entry.endpoints.iter().find(|ep| {
            let interface_ok = ep.interface == interface;
            let region_ok = match region {
                Some(r) => ep.region.as_deref() == Some(r) || ep.region_id.as_deref() == Some(r),
                None => true,
            };
            interface_ok && region_ok
        });

        if let Some(ep) = found {
            return Some(ep.url.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<CatalogEntry> {
        serde_json::from_value(json!([
            {
                "type": "compute",
                "endpoints": [
                    {"interface": "internal", "region": "RegionOne", "url": "http://nova.internal/v2.1"},
                    {"interface": "public", "region": "RegionOne", "url": "https://nova.example/v2.1"},
                    {"interface": "public", "region": "RegionTwo", "url": "https://nova2.example/v2.1"}
                ]
            },
            {
                "type": "block-storage",
                "endpoints": [
                    {"interface": "public", "region_id": "RegionOne", "url": "https://cinder.example/v3/p1"}
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_tokens_url_handles_versioned_and_bare() {
        assert_eq!(tokens_url("https://ks:5000"), "https://ks:5000/v3/auth/tokens");
        assert_eq!(tokens_url("https://ks:5000/v3/"), "https://ks:5000/v3/auth/tokens");
    }

    #[test]
    fn test_find_endpoint_by_interface_and_region() {
        let cat = catalog();
        assert_eq!(
            find_endpoint(&cat, &["compute"], "public", Some("RegionTwo")).as_deref(),
            Some("https://nova2.example/v2.1")
        );
        assert_eq!(
            find_endpoint(&cat, &["compute"], "internal", None).as_deref(),
            Some("http://nova.internal/v2.1")
        );
        assert_eq!(
            find_endpoint(&cat, &["volumev3", "block-storage"], "public", Some("RegionOne")).as_deref(),
            Some("https://cinder.example/v3/p1")
        );
        assert!(find_endpoint(&cat, &["load-balancer"], "public", None).is_none());
    }

    #[test]
    fn test_password_request_scopes_project_by_name() {
        let auth = AuthSettings {
            auth_url: Some("https://ks".to_string()),
            username: Some("alice".to_string()),
            password: Some("s3cret".to_string()),
            project_name: Some("demo".to_string()),
            project_domain_name: Some("Default".to_string()),
            ..Default::default()
        };
        let body = build_auth_request(&auth).unwrap();
        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
        assert_eq!(body["auth"]["identity"]["password"]["user"]["name"], "alice");
        assert_eq!(body["auth"]["identity"]["password"]["user"]["domain"]["id"], "default");
        assert_eq!(body["auth"]["scope"]["project"]["name"], "demo");
        assert_eq!(body["auth"]["scope"]["project"]["domain"]["name"], "Default");
    }

    #[test]
    fn test_application_credential_request_has_no_scope() {
        let auth = AuthSettings {
            application_credential_id: Some("ac-1".to_string()),
            application_credential_secret: Some("x".to_string()),
            project_id: Some("ignored".to_string()),
            ..Default::default()
        };
        let body = build_auth_request(&auth).unwrap();
        assert_eq!(body["auth"]["identity"]["application_credential"]["id"], "ac-1");
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_missing_password_is_an_auth_error() {
        let auth = AuthSettings {
            username: Some("alice".to_string()),
            ..Default::default()
        };
        assert!(matches!(build_auth_request(&auth), Err(CloudError::Auth(_))));
    }

    #[test]
    fn test_identity_from_token() {
        let body: TokenBody = serde_json::from_value(json!({
            "token": {
                "expires_at": "2030-01-01T00:00:00.000000Z",
                "project": {"id": "p1", "name": "demo", "domain": {"id": "default", "name": "Default"}},
                "user": {"id": "u1", "name": "alice"},
                "roles": [{"id": "r1", "name": "member"}, {"id": "r2", "name": "reader"}]
            }
        }))
        .unwrap();
        let identity = identity_from(&body.token);
        assert_eq!(identity.domain.as_deref(), Some("Default"));
        assert_eq!(identity.project_id.as_deref(), Some("p1"));
        assert_eq!(identity.user.as_deref(), Some("alice"));
        assert_eq!(identity.roles, vec!["member", "reader"]);
    }

    #[test]
    fn test_token_ttl() {
        let now = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            token_ttl("2030-01-01T01:00:00Z", now),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(token_ttl("2029-12-31T00:00:00Z", now), None);
        assert_eq!(token_ttl("garbage", now), None);
    }
}
