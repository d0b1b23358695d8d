use async_trait::async_trait;

use crate::domain::errors::DomainError;

/// Metadata-only check that a URL resolves, without fetching the body.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<(), DomainError>;
}
