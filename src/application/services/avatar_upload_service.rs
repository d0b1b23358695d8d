use bytes::Bytes;
use std::sync::Arc;

use crate::application::dto::avatar_dto::{AvatarUploadResult, UploadAvatarDto};
use crate::application::errors::{ApplicationError, AvatarWarning};
use crate::application::services::avatar_retention_service::AvatarRetentionService;
use crate::application::services::deadline::with_deadline;
use crate::domain::clock::Clock;
use crate::domain::errors::DomainError;
use crate::domain::models::avatar::{NamingPolicy, UserPrefix};
use crate::domain::models::config::AvatarConfig;
use crate::domain::models::profile::AvatarPointerUpdate;
use crate::domain::repositories::object_store::ObjectStore;
use crate::domain::repositories::profile_repository::ProfilePointerRepository;
use crate::infrastructure::persistence::avatar_image::{
    normalize_avatar, NormalizeOptions, NormalizedImage,
};

/// Runs normalize → put → point → prune for a single upload.
pub struct AvatarUploadService {
    object_store: Arc<dyn ObjectStore>,
    profile_repository: Arc<dyn ProfilePointerRepository>,
    retention: Arc<AvatarRetentionService>,
    clock: Arc<dyn Clock>,
    config: AvatarConfig,
}

impl AvatarUploadService {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        profile_repository: Arc<dyn ProfilePointerRepository>,
        retention: Arc<AvatarRetentionService>,
        clock: Arc<dyn Clock>,
        config: AvatarConfig,
    ) -> Self {
        Self {
            object_store,
            profile_repository,
            retention,
            clock,
            config,
        }
    }

    pub async fn upload(
        &self,
        user_id: &str,
        dto: UploadAvatarDto,
    ) -> Result<AvatarUploadResult, ApplicationError> {
        tracing::debug!(
            "Uploading avatar for {} ({}, {} bytes)",
            user_id,
            dto.content_type,
            dto.declared_size
        );

        let prefix = UserPrefix::parse(user_id)?;
        self.validate(&dto)?;

        let normalized = self.normalize(dto.bytes).await?;
        let mut warnings = Vec::new();

        let captured_at = self.clock.now();
        let key = match self.config.naming_policy {
            NamingPolicy::Versioned => prefix.versioned_key(captured_at, rand::random::<u32>()),
            NamingPolicy::SingleSlot => {
                let key = prefix.single_slot_key();
                self.clear_slot(&key, &mut warnings).await;
                key
            }
        };

        let stored_key = with_deadline(
            self.config.timeouts.store(),
            "put",
            self.object_store.put(
                &key,
                Bytes::from(normalized.bytes),
                normalized.content_type,
                self.config.naming_policy.cache_control(),
            ),
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to store avatar {}: {}", key, e);
            ApplicationError::StoreWriteFailed(e.to_string())
        })?;

        let url = match self.object_store.public_url(&stored_key) {
            Ok(url) => url,
            Err(e) => {
                let message = format!("Failed to resolve public URL: {}", e);
                return Err(self.abandon_pointer(stored_key, None, message, &e).await);
            }
        };

        let updated_at = self.clock.now();
        if let Err(e) = with_deadline(
            self.config.timeouts.profile(),
            "pointer update",
            self.profile_repository
                .update_pointer(user_id, &AvatarPointerUpdate::point_to(url.clone(), updated_at)),
        )
        .await
        {
            let message = format!("Failed to update profile: {}", e);
            return Err(self
                .abandon_pointer(stored_key, Some(url), message, &e)
                .await);
        }

        tracing::info!("Avatar updated for {}: {}", user_id, stored_key);

        if self.config.naming_policy == NamingPolicy::Versioned {
            match self
                .retention
                .prune(user_id, self.config.retention_keep, std::slice::from_ref(&stored_key))
                .await
            {
                Ok(report) => warnings.extend(report.warnings),
                Err(e) => {
                    tracing::warn!("Retention after upload failed for {}: {}", user_id, e);
                    warnings.push(AvatarWarning::StoreListFailed {
                        prefix: prefix.as_str().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(AvatarUploadResult {
            url,
            key: stored_key,
            updated_at,
            warnings,
        })
    }

    fn validate(&self, dto: &UploadAvatarDto) -> Result<(), ApplicationError> {
        let content_type = dto.content_type.trim().to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            return Err(ApplicationError::InvalidInputType(format!(
                "Expected an image, got {:?}",
                dto.content_type
            )));
        }

        let limit = self.config.max_upload_bytes;
        let size = dto.declared_size.max(dto.bytes.len() as u64);
        if size > limit {
            return Err(ApplicationError::PayloadTooLarge { size, limit });
        }

        Ok(())
    }

    async fn normalize(&self, bytes: Bytes) -> Result<NormalizedImage, ApplicationError> {
        let options = NormalizeOptions {
            edge_length: self.config.normalized_edge_length,
            quality: self.config.compression_quality,
        };

        let task = tokio::task::spawn_blocking(move || normalize_avatar(&bytes, options));
        match tokio::time::timeout(self.config.timeouts.normalize(), task).await {
            Ok(Ok(Ok(normalized))) => Ok(normalized),
            Ok(Ok(Err(e))) => Err(ApplicationError::NormalizationFailed(e.0)),
            Ok(Err(e)) => Err(ApplicationError::NormalizationFailed(format!(
                "Normalization task failed: {}",
                e
            ))),
            Err(_) => Err(ApplicationError::NormalizationFailed(format!(
                "Normalization timed out after {} ms",
                self.config.timeouts.normalize_ms
            ))),
        }
    }

    /// Best-effort removal of the previous single-slot object.
    async fn clear_slot(&self, key: &str, warnings: &mut Vec<AvatarWarning>) {
        let keys = [key.to_string()];
        if let Err(e) = with_deadline(
            self.config.timeouts.store(),
            "delete",
            self.object_store.delete(&keys),
        )
        .await
        {
            tracing::warn!("Could not remove previous avatar {}: {}", key, e);
            warnings.push(AvatarWarning::StoreDeleteFailed {
                keys: keys.to_vec(),
                message: e.to_string(),
            });
        }
    }

    /// The object exists but the profile does not point at it.
    ///
    /// A versioned object is removed again unless the failed step timed out, in
    /// which case the write may still have landed and the object must stay.
    async fn abandon_pointer(
        &self,
        key: String,
        url: Option<String>,
        message: String,
        cause: &DomainError,
    ) -> ApplicationError {
        tracing::error!("{} (object {})", message, key);

        let compensate = self.config.naming_policy == NamingPolicy::Versioned
            && !matches!(cause, DomainError::Timeout(_));

        let message = if !compensate {
            tracing::warn!("Leaving unreferenced avatar object {}", key);
            format!("{}; object {} left in store", message, key)
        } else {
            let keys = [key.clone()];
            match with_deadline(
                self.config.timeouts.store(),
                "delete",
                self.object_store.delete(&keys),
            )
            .await
            {
                Ok(()) => {
                    tracing::info!("Removed unreferenced avatar object {}", key);
                    format!("{}; object {} removed", message, key)
                }
                Err(e) => {
                    tracing::warn!("Could not remove unreferenced avatar {}: {}", key, e);
                    format!("{}; object {} left in store: {}", message, key, e)
                }
            }
        };

        ApplicationError::PointerUpdateFailed {
            key: Some(key),
            url,
            message,
        }
    }
}
