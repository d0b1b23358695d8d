use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::DomainError;
use crate::domain::models::avatar::ObjectEntry;

/// Blob store holding avatar objects, scoped per user by key prefix.
///
/// Writes are all-or-nothing per object and a key is readable right after `put`
/// returns. Listings may lag behind writes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `key`, replacing any previous object. Returns the stored key.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<String, DomainError>;

    /// List the objects directly under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, DomainError>;

    /// Delete the given keys. Missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> Result<(), DomainError>;

    /// Public locator of `key`. Does not check that the object exists.
    fn public_url(&self, key: &str) -> Result<String, DomainError>;
}
