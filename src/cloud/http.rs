//! HTTP utilities for OpenStack REST API calls

use super::error::CloudError;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Header carrying the Keystone token on requests
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Header carrying the issued token on a Keystone auth response
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_LOG_BODY_LENGTH)
            .last()
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for OpenStack API calls
#[derive(Clone)]
pub struct CloudHttpClient {
    client: Client,
}

impl CloudHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, CloudError> {
        let client = Client::builder()
            .user_agent(concat!("osview/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    /// Make an authenticated GET request
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, CloudError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(AUTH_TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::warn!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(CloudError::from_status(status.as_u16()));
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// POST a Keystone auth request, returning the subject token and the body
    pub async fn post_auth(&self, url: &str, body: &Value) -> Result<(String, Value), CloudError> {
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let response_body = response.text().await?;

        if !status.is_success() {
            tracing::error!("Auth error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(CloudError::Auth(format!("identity service returned {}", status)));
        }

        let Some(token) = token else {
            return Err(CloudError::Auth(format!(
                "response carried no {} header",
                SUBJECT_TOKEN_HEADER
            )));
        };

        Ok((token, serde_json::from_str(&response_body)?))
    }
}

/// Format an API error for display
/// Sanitizes error messages to avoid leaking API details
pub fn format_cloud_error(error: &anyhow::Error) -> String {
    if let Some(cloud) = error.downcast_ref::<CloudError>() {
        return match cloud {
            CloudError::Http { status: 401 } | CloudError::Auth(_) => {
                "Authentication failed. Check your clouds.yaml or OS_* environment.".to_string()
            }
            CloudError::Http { status: 403 } => {
                "Permission denied. Check your project role assignments.".to_string()
            }
            CloudError::Http { status: 429 } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            CloudError::Http { status } if *status >= 500 => {
                "Cloud service temporarily unavailable. Please try again.".to_string()
            }
            CloudError::Unsupported(_) => "Service not available on this cloud.".to_string(),
            CloudError::Transport(_) => {
                "Request failed. Check your network connection and try again.".to_string()
            }
            other => other.to_string(),
        };
    }

    let error_str = format!("{:#}", error);

    // Truncate long error messages and remove potential sensitive data
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.contains("[truncated, 500 bytes total]"));
        assert!(out.len() < 300);
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_format_cloud_error_hides_details() {
        let err = anyhow::Error::new(CloudError::Http { status: 403 });
        assert_eq!(
            format_cloud_error(&err),
            "Permission denied. Check your project role assignments."
        );

        let err = anyhow::Error::new(CloudError::Http { status: 503 });
        assert!(format_cloud_error(&err).contains("temporarily unavailable"));
    }
}
