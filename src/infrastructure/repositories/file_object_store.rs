use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mime_guess::from_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as tokio_fs;
use url::Url;

use crate::domain::clock::{Clock, SystemClock};
use crate::domain::errors::DomainError;
use crate::domain::models::avatar::{ObjectEntry, StoredObject};
use crate::domain::repositories::object_store::ObjectStore;
use crate::infrastructure::persistence::file_system::{
    delete_file, read_json_file, write_file_atomic, write_json_file,
};

const METADATA_SUFFIX: &str = ".meta.json";
const STAGING_SUFFIX: &str = ".tmp";

/// Age after which a staging file no write can still be using is removed.
fn staging_grace() -> chrono::Duration {
    chrono::Duration::minutes(10)
}

/// Object store keeping every object as a file under `{root}/{prefix}/{name}`.
///
/// Metadata lives in a hidden sidecar next to the object. Public URLs are
/// `{base_url}/{prefix}/{name}`, served by the object server.
pub struct FileObjectStore {
    root: PathBuf,
    base_url: Url,
    clock: Arc<dyn Clock>,
}

impl FileObjectStore {
    pub fn new(root: PathBuf, base_url: &str) -> Result<Self, DomainError> {
        Self::with_clock(root, base_url, Arc::new(SystemClock))
    }

    pub fn with_clock(
        root: PathBuf,
        base_url: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            DomainError::InvalidData(format!("Invalid public base URL {:?}: {}", base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(DomainError::InvalidData(format!(
                "Public base URL cannot carry a path: {}",
                base_url
            )));
        }

        Ok(Self {
            root,
            base_url,
            clock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read an object together with its metadata.
    pub async fn get(&self, key: &str) -> Result<(Bytes, StoredObject), DomainError> {
        let (prefix, name) = split_key(key)?;
        let object_path = self.root.join(prefix).join(name);

        let bytes = tokio_fs::read(&object_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::NotFound(format!("Object not found: {}", key))
            } else {
                tracing::error!("Failed to read object {}: {}", key, e);
                DomainError::InternalError(format!("Failed to read object {}: {}", key, e))
            }
        })?;

        let metadata = match self.read_metadata(prefix, name).await? {
            Some(metadata) => metadata,
            None => StoredObject {
                key: key.to_string(),
                created_at: self.fallback_created_at(&object_path).await,
                content_type: from_path(name).first_or_octet_stream().essence_str().to_string(),
                cache_control: "no-cache".to_string(),
                size_bytes: bytes.len() as u64,
            },
        };

        Ok((Bytes::from(bytes), metadata))
    }

    fn metadata_path(&self, prefix: &str, name: &str) -> PathBuf {
        self.root
            .join(prefix)
            .join(format!(".{}{}", name, METADATA_SUFFIX))
    }

    async fn read_metadata(
        &self,
        prefix: &str,
        name: &str,
    ) -> Result<Option<StoredObject>, DomainError> {
        match read_json_file::<StoredObject>(&self.metadata_path(prefix, name)).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(DomainError::NotFound(_)) => Ok(None),
            Err(DomainError::InvalidData(message)) => {
                tracing::warn!("Ignoring corrupt metadata for {}/{}: {}", prefix, name, message);
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Remove sidecars whose object is gone and staging files abandoned by
    /// interrupted writes. Failures are only logged.
    async fn sweep_hidden(&self, dir: &Path, objects: &[ObjectEntry], hidden: Vec<PathBuf>) {
        let now = self.clock.now();
        for path in hidden {
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };

            let stale = if file_name.ends_with(STAGING_SUFFIX) {
                match tokio_fs::metadata(&path).await.and_then(|m| m.modified()) {
                    Ok(modified) => now - DateTime::<Utc>::from(modified) > staging_grace(),
                    Err(_) => false,
                }
            } else if let Some(object_name) = file_name
                .strip_prefix('.')
                .and_then(|rest| rest.strip_suffix(METADATA_SUFFIX))
            {
                !objects.iter().any(|entry| entry.name == object_name)
                    && tokio_fs::try_exists(dir.join(object_name))
                        .await
                        .is_ok_and(|exists| !exists)
            } else {
                false
            };

            if stale {
                match delete_file(&path).await {
                    Ok(()) => tracing::debug!("Removed leftover file {:?}", path),
                    Err(error) => tracing::warn!("Could not remove leftover file {:?}: {}", path, error),
                }
            }
        }
    }

    async fn fallback_created_at(&self, path: &Path) -> DateTime<Utc> {
        match tokio_fs::metadata(path).await {
            Ok(metadata) => metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| self.clock.now()),
            Err(_) => self.clock.now(),
        }
    }
}

/// Split `{prefix}/{name}` and reject anything that could leave the store root.
fn split_key(key: &str) -> Result<(&str, &str), DomainError> {
    let invalid = || DomainError::InvalidData(format!("Invalid object key: {:?}", key));

    let (prefix, name) = key.split_once('/').ok_or_else(invalid)?;
    for segment in [prefix, name] {
        if segment.is_empty()
            || segment.starts_with('.')
            || segment.contains('/')
            || segment.contains('\\')
            || segment.chars().any(char::is_control)
        {
            return Err(invalid());
        }
    }

    Ok((prefix, name))
}

fn normalize_prefix(prefix: &str) -> Result<&str, DomainError> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.contains('/')
        || trimmed.contains('\\')
    {
        return Err(DomainError::InvalidData(format!(
            "Invalid object prefix: {:?}",
            prefix
        )));
    }
    Ok(trimmed)
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<String, DomainError> {
        let (prefix, name) = split_key(key)?;
        tracing::debug!("Storing object {} ({} bytes)", key, bytes.len());

        let metadata = StoredObject {
            key: key.to_string(),
            created_at: self.clock.now(),
            content_type: content_type.to_string(),
            cache_control: cache_control.to_string(),
            size_bytes: bytes.len() as u64,
        };

        // Object first: an interrupted put leaves at worst an object without a sidecar
        let object_path = self.root.join(prefix).join(name);
        write_file_atomic(&object_path, &bytes).await?;

        if let Err(error) = write_json_file(&self.metadata_path(prefix, name), &metadata).await {
            let _ = delete_file(&object_path).await;
            return Err(error);
        }

        tracing::info!("Object stored: {}", key);
        Ok(key.to_string())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, DomainError> {
        let prefix = normalize_prefix(prefix)?;
        let dir = self.root.join(prefix);

        let mut entries = match tokio_fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                tracing::error!("Failed to list objects under {}: {}", prefix, e);
                return Err(DomainError::InternalError(format!(
                    "Failed to list objects under {}: {}",
                    prefix, e
                )));
            }
        };

        let mut objects = Vec::new();
        let mut hidden = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            tracing::error!("Failed to read directory entry: {}", e);
            DomainError::InternalError(format!("Failed to read directory entry: {}", e))
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            // Sidecars and in-flight writes are hidden
            if name.starts_with('.') {
                hidden.push(entry.path());
                continue;
            }

            let path = entry.path();
            let Ok(file_metadata) = entry.metadata().await else {
                continue;
            };
            if !file_metadata.is_file() {
                continue;
            }

            let created_at = match self.read_metadata(prefix, &name).await? {
                Some(metadata) => metadata.created_at,
                None => self.fallback_created_at(&path).await,
            };

            objects.push(ObjectEntry {
                key: format!("{}/{}", prefix, name),
                name,
                created_at,
                size_bytes: file_metadata.len(),
            });
        }

        self.sweep_hidden(&dir, &objects, hidden).await;

        tracing::debug!("Found {} objects under {}", objects.len(), prefix);
        Ok(objects)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), DomainError> {
        let mut failures = Vec::new();

        for key in keys {
            let result = match split_key(key) {
                Ok((prefix, name)) => {
                    match delete_file(&self.root.join(prefix).join(name)).await {
                        Ok(()) => delete_file(&self.metadata_path(prefix, name)).await,
                        Err(error) => Err(error),
                    }
                }
                Err(error) => Err(error),
            };

            match result {
                Ok(()) => tracing::info!("Object deleted: {}", key),
                Err(error) => failures.push(format!("{}: {}", key, error)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InternalError(format!(
                "Failed to delete objects: {}",
                failures.join("; ")
            )))
        }
    }

    fn public_url(&self, key: &str) -> Result<String, DomainError> {
        let (prefix, name) = split_key(key)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DomainError::InternalError(format!("Base URL cannot be extended: {}", self.base_url))
            })?
            .pop_if_empty()
            .push(prefix)
            .push(name);
        Ok(url.to_string())
    }
}
