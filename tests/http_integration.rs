//! Integration tests for the OpenStack HTTP client using wiremock
//!
//! These tests run Keystone authentication, catalog lookup, pagination and
//! the degrade-to-empty policy against mocked endpoints.

use osview::cloud::client::CloudClient;
use osview::cloud::http::format_cloud_error;
use osview::cloud::CloudError;
use osview::config::{AuthSettings, CloudProfile};
use osview::resource::{fetch_or_empty, show_or_none, Fetcher, ResourceFilter};
use osview::snapshot::Snapshot;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "gAAAAA-test-token";

fn token_body(uri: &str) -> Value {
    json!({
        "token": {
            "expires_at": "2099-01-01T00:00:00.000000Z",
            "project": {"id": "p1", "name": "demo", "domain": {"id": "default", "name": "Default"}},
            "user": {"id": "u1", "name": "alice"},
            "roles": [{"id": "r1", "name": "member"}, {"id": "r2", "name": "reader"}],
            "catalog": [
                {
                    "type": "network",
                    "endpoints": [
                        {"interface": "public", "region": "RegionOne", "url": format!("{}/network/v2.0", uri)},
                        {"interface": "internal", "region": "RegionOne", "url": "http://127.0.0.1:1/network"}
                    ]
                },
                {
                    "type": "compute",
                    "endpoints": [
                        {"interface": "public", "region": "RegionOne", "url": format!("{}/compute/v2.1", uri)}
                    ]
                }
            ]
        }
    })
}

fn profile(uri: &str) -> CloudProfile {
    CloudProfile {
        auth: AuthSettings {
            auth_url: Some(format!("{}/identity/v3", uri)),
            username: Some("alice".to_string()),
            password: Some("secret".to_string()),
            user_domain_name: Some("Default".to_string()),
            project_name: Some("demo".to_string()),
            project_domain_name: Some("Default".to_string()),
            ..Default::default()
        },
        region_name: Some("RegionOne".to_string()),
        interface: None,
    }
}

async fn mount_keystone(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/identity/v3/auth/tokens"))
        .and(body_partial_json(json!({
            "auth": {"identity": {"methods": ["password"]}}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", TOKEN)
                .set_body_json(token_body(&server.uri())),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Test module for Keystone authentication
mod auth_tests {
    use super::*;

    /// Identity comes from the token body
    #[tokio::test]
    async fn test_identity_from_token() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        let client = CloudClient::new(profile(&server.uri())).expect("client should build");
        let identity = client.identity().await.expect("auth should succeed");

        assert_eq!(identity.project.as_deref(), Some("demo"));
        assert_eq!(identity.project_id.as_deref(), Some("p1"));
        assert_eq!(identity.domain.as_deref(), Some("Default"));
        assert_eq!(identity.user.as_deref(), Some("alice"));
        assert_eq!(identity.roles, vec!["member", "reader"]);
    }

    /// The token is cached across requests
    #[tokio::test]
    async fn test_token_reused() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .and(header("X-Auth-Token", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
            .expect(3)
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        for _ in 0..3 {
            let networks = client.list("networks", &[]).await.expect("list should succeed");
            assert!(networks.is_empty());
        }
    }

    /// Concurrent callers on a cold cache share a single token request
    #[tokio::test]
    async fn test_concurrent_callers_authenticate_once() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/identity/v3/auth/tokens"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Subject-Token", TOKEN)
                    .set_body_json(token_body(&server.uri()))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let tokens = futures::future::join_all((0..10).map(|_| client.credentials.get_token())).await;

        assert_eq!(tokens.len(), 10);
        for token in tokens {
            assert_eq!(token.expect("token should be issued"), TOKEN);
        }
    }

    /// 401 from Keystone surfaces as an authentication error
    #[tokio::test]
    async fn test_auth_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/identity/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 401, "message": "The request you have made requires authentication."}
            })))
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let err = client.identity().await.expect_err("auth should fail");
        assert!(matches!(err, CloudError::Auth(_)));

        let message = format_cloud_error(&anyhow::Error::from(err));
        assert!(message.starts_with("Authentication failed"));
        assert!(!message.contains("requires authentication"));
    }

    /// A success without the subject token header is an auth error
    #[tokio::test]
    async fn test_missing_subject_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/identity/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(token_body(&server.uri())))
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        assert!(matches!(client.identity().await, Err(CloudError::Auth(_))));
    }
}

/// Test module for collection fetching
mod fetch_tests {
    use super::*;

    /// Pages are followed through `<collection>_links`
    #[tokio::test]
    async fn test_pagination_follows_next_links() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/network/v2.0/ports"))
            .and(query_param("marker", "a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ports": [{"id": "b"}],
                "ports_links": [{"rel": "previous", "href": format!("{}/network/v2.0/ports?marker=b&page_reverse=True", server.uri())}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/network/v2.0/ports"))
            .and(query_param("project_id", "p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ports": [{"id": "a"}],
                "ports_links": [{"rel": "next", "href": format!("{}/network/v2.0/ports?marker=a", server.uri())}]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let filters = [ResourceFilter::new("project_id", vec!["p1".to_string()])];
        let ports = client.list("ports", &filters).await.expect("list should succeed");

        let ids: Vec<&str> = ports.iter().filter_map(|p| p["id"].as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    /// A 404 (extension not loaded) degrades to an unavailable collection
    #[tokio::test]
    async fn test_404_is_unsupported() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/network/v2.0/trunks"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<html>Not Found</html>"))
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let err = client.list("trunks", &[]).await.expect_err("404 should fail");
        assert!(err.is_unsupported());

        let trunks = fetch_or_empty(&client, "trunks", &[]).await;
        assert!(!trunks.available);
        assert!(trunks.is_empty());
    }

    /// A service missing from the catalog is unsupported, not fatal
    #[tokio::test]
    async fn test_missing_service_is_unsupported() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let err = client.list("volumes", &[]).await.expect_err("no volume endpoint");
        assert!(err.is_unsupported());
    }

    /// Server errors are failures, and still degrade to empty
    #[tokio::test]
    async fn test_500_degrades_to_empty() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/servers/detail"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let err = client.list("servers", &[]).await.expect_err("500 should fail");
        assert!(matches!(err, CloudError::Http { status: 500 }));

        let servers = fetch_or_empty(&client, "servers", &[]).await;
        assert!(!servers.available);
    }

    /// Single documents are unwrapped from their response path
    #[tokio::test]
    async fn test_show_document() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/limits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "limits": {"absolute": {"totalInstancesUsed": 3, "totalCoresUsed": 6, "totalRAMUsed": 12288}}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/compute/v2.1/flavors/f1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "flavor": {"id": "f1", "name": "m1.small", "vcpus": 1, "ram": 2048}
            })))
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let limits = show_or_none(&client, "compute-limits", "p1").await.expect("limits");
        assert_eq!(limits["absolute"]["totalCoresUsed"], 6);

        let flavor = show_or_none(&client, "flavor", "f1").await.expect("flavor");
        assert_eq!(flavor["name"], "m1.small");

        assert!(show_or_none(&client, "flavor", "missing").await.is_none());
    }

    /// One snapshot over a partial cloud: absent APIs become unavailable
    #[tokio::test]
    async fn test_snapshot_over_partial_cloud() {
        let server = MockServer::start().await;
        mount_keystone(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/network/v2.0/networks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "networks": [{"id": "n1", "name": "private"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/network/v2.0/ports"))
            .and(query_param("project_id", "p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ports": [{"id": "port-1", "network_id": "n1"}]
            })))
            .mount(&server)
            .await;

        let client = CloudClient::new(profile(&server.uri())).unwrap();
        let identity = client.identity().await.unwrap();
        let project_id = identity.project_id.clone();
        let snapshot = Snapshot::fetch(&client, project_id.as_deref(), identity).await;

        assert!(snapshot.networks.available);
        assert_eq!(snapshot.networks.len(), 1);
        assert_eq!(snapshot.ports.len(), 1);
        assert!(!snapshot.trunks.available);
        assert!(!snapshot.volumes.available);
        assert!(!snapshot.images.available);
        assert_eq!(snapshot.project_id.as_deref(), Some("p1"));
    }
}
