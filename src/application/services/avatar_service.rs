use std::sync::Arc;

use crate::application::dto::avatar_dto::{
    AvatarUploadResult, PruneReport, RemovalReport, SweepReport, UploadAvatarDto, VerifyOutcome,
};
use crate::application::errors::{ApplicationError, AvatarWarning};
use crate::application::services::avatar_link_verifier::AvatarLinkVerifier;
use crate::application::services::avatar_retention_service::AvatarRetentionService;
use crate::application::services::avatar_upload_service::AvatarUploadService;
use crate::application::services::deadline::with_deadline;
use crate::domain::clock::Clock;
use crate::domain::models::avatar::{is_avatar_name, UserPrefix};
use crate::domain::models::config::AvatarConfig;
use crate::domain::models::profile::AvatarPointerUpdate;
use crate::domain::repositories::object_store::ObjectStore;
use crate::domain::repositories::profile_repository::ProfilePointerRepository;
use crate::domain::repositories::reachability_probe::ReachabilityProbe;
use crate::infrastructure::logging::logger;

/// Service for managing user avatars
pub struct AvatarService {
    object_store: Arc<dyn ObjectStore>,
    profile_repository: Arc<dyn ProfilePointerRepository>,
    clock: Arc<dyn Clock>,
    retention: Arc<AvatarRetentionService>,
    uploads: AvatarUploadService,
    verifier: AvatarLinkVerifier,
    config: AvatarConfig,
}

impl AvatarService {
    /// Create a new AvatarService
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        profile_repository: Arc<dyn ProfilePointerRepository>,
        probe: Arc<dyn ReachabilityProbe>,
        clock: Arc<dyn Clock>,
        config: AvatarConfig,
    ) -> Self {
        let retention = Arc::new(AvatarRetentionService::new(
            object_store.clone(),
            profile_repository.clone(),
            config.timeouts.clone(),
        ));
        let uploads = AvatarUploadService::new(
            object_store.clone(),
            profile_repository.clone(),
            retention.clone(),
            clock.clone(),
            config.clone(),
        );
        let verifier = AvatarLinkVerifier::new(
            profile_repository.clone(),
            probe,
            clock.clone(),
            config.timeouts.clone(),
            config.probe_retries,
        );

        Self {
            object_store,
            profile_repository,
            clock,
            retention,
            uploads,
            verifier,
            config,
        }
    }

    pub fn config(&self) -> &AvatarConfig {
        &self.config
    }

    /// Upload an avatar
    pub async fn upload(
        &self,
        user_id: &str,
        dto: UploadAvatarDto,
    ) -> Result<AvatarUploadResult, ApplicationError> {
        self.uploads.upload(user_id, dto).await
    }

    /// Prune old versions using the configured retention count
    pub async fn prune(&self, user_id: &str) -> Result<PruneReport, ApplicationError> {
        logger::debug(&format!("Pruning avatars for {}", user_id));
        self.retention
            .prune(user_id, self.config.retention_keep, &[])
            .await
    }

    pub async fn verify(&self, user_id: &str) -> Result<VerifyOutcome, ApplicationError> {
        self.verifier.verify(user_id).await
    }

    pub async fn verify_all(&self) -> Result<SweepReport, ApplicationError> {
        self.verifier.verify_all().await
    }

    /// Delete an avatar
    ///
    /// The pointer is cleared first so the profile never references a deleted
    /// object. Only objects created before the clear are removed, and never the
    /// one the pointer references by the time of deletion, so an upload racing
    /// the removal keeps its object. Object removal is best-effort.
    pub async fn remove(&self, user_id: &str) -> Result<RemovalReport, ApplicationError> {
        logger::debug(&format!("Removing avatar of {}", user_id));
        let prefix = UserPrefix::parse(user_id)?;

        let cleared_at = self.clock.now();
        with_deadline(
            self.config.timeouts.profile(),
            "pointer clear",
            self.profile_repository
                .update_pointer(user_id, &AvatarPointerUpdate::clear(cleared_at)),
        )
        .await
        .map_err(|e| ApplicationError::PointerUpdateFailed {
            key: None,
            url: None,
            message: format!("Failed to clear profile: {}", e),
        })?;

        let mut report = RemovalReport::default();
        let entries = match with_deadline(
            self.config.timeouts.store(),
            "list",
            self.object_store.list(prefix.as_str()),
        )
        .await
        {
            Ok(entries) => entries,
            Err(e) => {
                logger::warn(&format!("Could not list avatars of {}: {}", user_id, e));
                report.warnings.push(AvatarWarning::StoreListFailed {
                    prefix: prefix.as_str().to_string(),
                    message: e.to_string(),
                });
                return Ok(report);
            }
        };

        let mut keys: Vec<String> = entries
            .into_iter()
            .filter(|entry| {
                is_avatar_name(&entry.name)
                    && prefix.owns_key(&entry.key)
                    && entry.created_at < cleared_at
            })
            .map(|entry| entry.key)
            .collect();
        if keys.is_empty() {
            return Ok(report);
        }

        // A pointer written after the clear wins over the removal
        match self.current_url(user_id).await {
            Ok(Some(url)) => keys.retain(|key| !self.is_url_of(key, &url)),
            Ok(None) => {}
            Err(message) => {
                logger::warn(&format!(
                    "Keeping avatars of {}: pointer unavailable: {}",
                    user_id, message
                ));
                report.warnings.push(AvatarWarning::PointerUnavailable {
                    user_id: user_id.to_string(),
                    message,
                });
                return Ok(report);
            }
        }
        if keys.is_empty() {
            return Ok(report);
        }

        match with_deadline(
            self.config.timeouts.store(),
            "delete",
            self.object_store.delete(&keys),
        )
        .await
        {
            Ok(()) => {
                logger::info(&format!("Removed {} avatar objects of {}", keys.len(), user_id));
                report.deleted = keys;
            }
            Err(e) => {
                logger::warn(&format!("Could not delete avatars of {}: {}", user_id, e));
                report.warnings.push(AvatarWarning::StoreDeleteFailed {
                    keys,
                    message: e.to_string(),
                });
                return Ok(report);
            }
        }

        self.release_deleted_pointer(user_id, &report.deleted, &mut report.warnings)
            .await;
        Ok(report)
    }

    async fn current_url(&self, user_id: &str) -> Result<Option<String>, String> {
        with_deadline(
            self.config.timeouts.profile(),
            "profile read",
            self.profile_repository.get_pointer(user_id),
        )
        .await
        .map(|pointer| pointer.avatar_url)
        .map_err(|e| e.to_string())
    }

    fn is_url_of(&self, key: &str, url: &str) -> bool {
        self.object_store
            .public_url(key)
            .is_ok_and(|candidate| candidate == url)
    }

    /// Clear a pointer that landed on one of `deleted` while it was being removed.
    async fn release_deleted_pointer(
        &self,
        user_id: &str,
        deleted: &[String],
        warnings: &mut Vec<AvatarWarning>,
    ) {
        let url = match self.current_url(user_id).await {
            Ok(Some(url)) => url,
            Ok(None) => return,
            Err(message) => {
                warnings.push(AvatarWarning::PointerUnavailable {
                    user_id: user_id.to_string(),
                    message,
                });
                return;
            }
        };
        if !deleted.iter().any(|key| self.is_url_of(key, &url)) {
            return;
        }

        logger::warn(&format!("Pointer of {} moved onto a removed avatar", user_id));
        if let Err(e) = with_deadline(
            self.config.timeouts.profile(),
            "pointer clear",
            self.profile_repository
                .update_pointer(user_id, &AvatarPointerUpdate::clear(self.clock.now())),
        )
        .await
        {
            warnings.push(AvatarWarning::PointerUnavailable {
                user_id: user_id.to_string(),
                message: format!("Failed to clear pointer to removed avatar: {}", e),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::domain::models::avatar::versioned_name;
    use crate::infrastructure::repositories::memory_object_store::MemoryObjectStore;
    use crate::test_support::{
        encode_test_png, FlakyObjectStore, FlakyProfileRepository, ManualClock,
    };

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<FlakyObjectStore>,
        profiles: Arc<FlakyProfileRepository>,
        service: Arc<AvatarService>,
    }

    fn fixture(config: AvatarConfig) -> Fixture {
        let clock = ManualClock::starting_at(1_700_000_000_000);
        let store = FlakyObjectStore::new(clock.clone());
        let profiles = FlakyProfileRepository::new();
        let service = Arc::new(AvatarService::new(
            store.clone(),
            profiles.clone(),
            store.clone(),
            clock.clone(),
            config,
        ));
        Fixture {
            clock,
            store,
            profiles,
            service,
        }
    }

    fn png(width: u32, height: u32) -> UploadAvatarDto {
        UploadAvatarDto::new(encode_test_png(width, height), "image/png")
    }

    #[tokio::test]
    async fn upload_then_verify_is_ok() {
        let fixture = fixture(AvatarConfig::default());
        fixture.service.upload("user-1", png(40, 30)).await.expect("upload");

        assert_eq!(fixture.service.verify("user-1").await, Ok(VerifyOutcome::Ok));
    }

    #[tokio::test]
    async fn deleting_the_live_object_gets_the_pointer_cleared() {
        let fixture = fixture(AvatarConfig::default());
        let uploaded = fixture.service.upload("user-1", png(40, 30)).await.expect("upload");

        fixture
            .store
            .inner
            .delete(&[uploaded.key.clone()])
            .await
            .expect("delete");

        assert_eq!(fixture.service.verify("user-1").await, Ok(VerifyOutcome::Cleared));
        assert_eq!(fixture.profiles.url_of("user-1").await, None);
    }

    #[tokio::test]
    async fn prune_uses_configured_retention() {
        let fixture = fixture(AvatarConfig {
            retention_keep: 2,
            ..AvatarConfig::default()
        });
        for suffix in 0..5u32 {
            fixture.clock.advance_secs(1);
            let key = format!("user-1/{}", versioned_name(fixture.clock.now(), suffix));
            fixture
                .store
                .put(&key, Bytes::from_static(b"x"), "image/jpeg", "no-cache")
                .await
                .expect("put");
        }

        let report = fixture.service.prune("user-1").await.expect("prune");

        assert_eq!(report.retained.len(), 2);
        assert_eq!(report.deleted.len(), 3);
    }

    #[tokio::test]
    async fn remove_clears_pointer_and_objects() {
        let fixture = fixture(AvatarConfig::default());
        for _ in 0..2 {
            fixture.clock.advance_secs(1);
            fixture.service.upload("user-1", png(8, 8)).await.expect("upload");
        }
        fixture
            .store
            .put("user-1/notes.txt", Bytes::from_static(b"keep"), "text/plain", "no-cache")
            .await
            .expect("put");
        fixture.clock.advance_secs(1);

        let report = fixture.service.remove("user-1").await.expect("remove");

        assert_eq!(report.deleted.len(), 2);
        assert_eq!(fixture.profiles.url_of("user-1").await, None);
        assert_eq!(fixture.store.names("user-1").await, vec!["notes.txt".to_string()]);
    }

    #[tokio::test]
    async fn remove_keeps_objects_when_the_pointer_cannot_be_cleared() {
        let fixture = fixture(AvatarConfig::default());
        let uploaded = fixture.service.upload("user-1", png(8, 8)).await.expect("upload");
        fixture.profiles.fail_update.store(true, Ordering::SeqCst);

        let result = fixture.service.remove("user-1").await;

        assert!(matches!(result, Err(ApplicationError::PointerUpdateFailed { .. })));
        assert!(fixture.store.inner.contains(&uploaded.key).await);
        assert_eq!(fixture.profiles.url_of("user-1").await, Some(uploaded.url));
    }

    #[tokio::test]
    async fn remove_reports_delete_failures_as_warnings() {
        let fixture = fixture(AvatarConfig::default());
        fixture.service.upload("user-1", png(8, 8)).await.expect("upload");
        fixture.clock.advance_secs(1);
        fixture.store.fail_delete.store(true, Ordering::SeqCst);

        let report = fixture.service.remove("user-1").await.expect("remove");

        assert!(report.deleted.is_empty());
        assert!(matches!(
            report.warnings.as_slice(),
            [AvatarWarning::StoreDeleteFailed { .. }]
        ));
        assert_eq!(fixture.profiles.url_of("user-1").await, None);
    }

    #[tokio::test]
    async fn upload_racing_a_removal_keeps_its_object() {
        let fixture = fixture(AvatarConfig::default());
        let old = fixture.service.upload("user-1", png(8, 8)).await.expect("upload");
        fixture.clock.advance_secs(1);
        fixture.store.list_delay_ms.store(300, Ordering::SeqCst);

        let removal = {
            let service = fixture.service.clone();
            tokio::spawn(async move { service.remove("user-1").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        fixture.clock.advance_secs(1);
        let fresh = fixture.service.upload("user-1", png(16, 8)).await.expect("upload");

        let report = removal.await.expect("join").expect("remove");

        assert_eq!(report.deleted, vec![old.key.clone()]);
        assert!(!fixture.store.inner.contains(&old.key).await);
        assert!(fixture.store.inner.contains(&fresh.key).await);
        assert_eq!(fixture.profiles.url_of("user-1").await, Some(fresh.url));
        fixture.store.list_delay_ms.store(0, Ordering::SeqCst);
        assert_eq!(fixture.service.verify("user-1").await, Ok(VerifyOutcome::Ok));
    }

    #[tokio::test]
    async fn remove_spares_the_object_a_late_pointer_references() {
        let fixture = fixture(AvatarConfig::default());
        let key = format!("user-1/{}", versioned_name(fixture.clock.now(), 7));
        fixture
            .store
            .put(&key, Bytes::from_static(b"x"), "image/jpeg", "no-cache")
            .await
            .expect("put");
        let url = fixture.store.public_url(&key).expect("url");
        fixture.clock.advance_secs(1);
        fixture.store.list_delay_ms.store(300, Ordering::SeqCst);

        let removal = {
            let service = fixture.service.clone();
            tokio::spawn(async move { service.remove("user-1").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The pointer lands after the clear but references an object stored before it
        fixture
            .profiles
            .update_pointer("user-1", &AvatarPointerUpdate::point_to(url.clone(), fixture.clock.now()))
            .await
            .expect("point");

        let report = removal.await.expect("join").expect("remove");

        assert!(report.deleted.is_empty());
        assert!(fixture.store.inner.contains(&key).await);
        assert_eq!(fixture.profiles.url_of("user-1").await, Some(url));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_uploads_never_leave_a_dangling_pointer() {
        let fixture = fixture(AvatarConfig {
            retention_keep: 1,
            ..AvatarConfig::default()
        });

        let uploads: Vec<_> = (0..6u32)
            .map(|index| {
                let service = fixture.service.clone();
                tokio::spawn(async move { service.upload("user-1", png(8 + index, 8)).await })
            })
            .collect();
        for upload in uploads {
            upload.await.expect("join").expect("upload");
        }

        // One verification pass heals a pointer that lost its object
        fixture.service.verify("user-1").await.expect("verify");
        if let Some(url) = fixture.profiles.url_of("user-1").await {
            let key = MemoryObjectStore::key_for_url(&url).expect("memory url");
            assert!(fixture.store.inner.contains(&key).await);
        }
        assert_eq!(fixture.service.verify("user-1").await, Ok(VerifyOutcome::Ok));
    }
}
