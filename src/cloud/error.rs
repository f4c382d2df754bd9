//! Fetch errors
//!
//! The one typed error in the crate: the report core needs to tell an
//! unsupported collection (extension disabled, service missing from the
//! catalog) apart from any other failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    /// The service or extension is not available on this cloud
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Unknown resource key (programming error in the registry)
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// Non-success HTTP status
    #[error("API request failed: {status}")]
    Http { status: u16 },

    /// Connection, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("failed to parse response JSON: {0}")]
    Decode(String),

    /// Authentication failed or the token could not be obtained
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl CloudError {
    /// Map an HTTP status to the error the core should see.
    ///
    /// 404 and 501 mean the endpoint (usually an API extension such as trunks
    /// or QoS) does not exist on this deployment.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 | 501 => CloudError::Unsupported(format!("endpoint returned {}", status)),
            _ => CloudError::Http { status },
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, CloudError::Unsupported(_))
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return CloudError::from_status(status.as_u16());
        }
        CloudError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_endpoints_are_unsupported() {
        assert!(CloudError::from_status(404).is_unsupported());
        assert!(CloudError::from_status(501).is_unsupported());
        assert!(!CloudError::from_status(500).is_unsupported());
        assert!(matches!(
            CloudError::from_status(403),
            CloudError::Http { status: 403 }
        ));
    }
}
