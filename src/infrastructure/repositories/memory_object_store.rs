use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::clock::{Clock, SystemClock};
use crate::domain::errors::DomainError;
use crate::domain::models::avatar::{ObjectEntry, StoredObject};
use crate::domain::repositories::object_store::ObjectStore;
use crate::domain::repositories::reachability_probe::ReachabilityProbe;

pub const MEMORY_URL_BASE: &str = "memory://avatars/";

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?');

/// Process-local object store. Its public URLs resolve only through its own probe.
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, (Bytes, StoredObject)>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    pub async fn get(&self, key: &str) -> Option<(Bytes, StoredObject)> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Inverse of `public_url`.
    pub fn key_for_url(url: &str) -> Option<String> {
        let path = url.strip_prefix(MEMORY_URL_BASE)?;
        let segments: Vec<String> = path
            .split('/')
            .map(|segment| percent_decode_str(segment).decode_utf8().map(|s| s.into_owned()))
            .collect::<Result<_, _>>()
            .ok()?;
        Some(segments.join("/"))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<String, DomainError> {
        if key.split_once('/').is_none_or(|(prefix, name)| prefix.is_empty() || name.is_empty()) {
            return Err(DomainError::InvalidData(format!("Invalid object key: {:?}", key)));
        }

        let metadata = StoredObject {
            key: key.to_string(),
            created_at: self.clock.now(),
            content_type: content_type.to_string(),
            cache_control: cache_control.to_string(),
            size_bytes: bytes.len() as u64,
        };

        self.objects
            .write()
            .await
            .insert(key.to_string(), (bytes, metadata));
        Ok(key.to_string())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, DomainError> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let objects = self.objects.read().await;

        Ok(objects
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, (_, metadata))| {
                let name = &key[prefix.len()..];
                // Only direct children, like a directory listing
                (!name.contains('/')).then(|| ObjectEntry {
                    name: name.to_string(),
                    key: key.clone(),
                    created_at: metadata.created_at,
                    size_bytes: metadata.size_bytes,
                })
            })
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), DomainError> {
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<String, DomainError> {
        let path: Vec<String> = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect();
        Ok(format!("{}{}", MEMORY_URL_BASE, path.join("/")))
    }
}

#[async_trait]
impl ReachabilityProbe for MemoryObjectStore {
    async fn probe(&self, url: &str) -> Result<(), DomainError> {
        let key = Self::key_for_url(url)
            .ok_or_else(|| DomainError::InvalidData(format!("Foreign URL: {}", url)))?;

        if self.contains(&key).await {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("Object not found: {}", key)))
        }
    }
}
