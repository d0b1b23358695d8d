use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::domain::errors::DomainError;
use crate::domain::repositories::reachability_probe::ReachabilityProbe;
use crate::infrastructure::http_client::build_http_client;

/// Probes URLs with `HEAD`; any non-2xx status or transport error is unreachable.
pub struct HttpReachabilityProbe {
    client: Client,
}

impl HttpReachabilityProbe {
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        let client = build_http_client(timeout).map_err(|e| {
            DomainError::InternalError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachabilityProbe {
    async fn probe(&self, url: &str) -> Result<(), DomainError> {
        tracing::debug!("Probing {}", url);

        let response = self.client.head(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DomainError::Timeout(format!("HEAD {} timed out", url))
            } else {
                DomainError::InternalError(format!("HEAD {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            Err(DomainError::NotFound(format!("HEAD {} returned {}", url, status)))
        } else {
            Err(DomainError::InternalError(format!(
                "HEAD {} returned {}",
                url, status
            )))
        }
    }
}
