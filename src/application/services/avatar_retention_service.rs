use std::collections::HashSet;
use std::sync::Arc;

use crate::application::dto::avatar_dto::PruneReport;
use crate::application::errors::{ApplicationError, AvatarWarning};
use crate::application::services::deadline::with_deadline;
use crate::domain::models::avatar::{is_versioned_name, ObjectEntry, UserPrefix};
use crate::domain::models::config::OperationTimeouts;
use crate::domain::repositories::object_store::ObjectStore;
use crate::domain::repositories::profile_repository::ProfilePointerRepository;

/// Bounds the number of versioned avatar objects kept per user.
pub struct AvatarRetentionService {
    object_store: Arc<dyn ObjectStore>,
    profile_repository: Arc<dyn ProfilePointerRepository>,
    timeouts: OperationTimeouts,
}

impl AvatarRetentionService {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        profile_repository: Arc<dyn ProfilePointerRepository>,
        timeouts: OperationTimeouts,
    ) -> Self {
        Self {
            object_store,
            profile_repository,
            timeouts,
        }
    }

    /// Keep the `keep` newest versioned objects of `user_id` and delete the rest.
    ///
    /// Keys in `protected`, and the key the profile currently points at, are never
    /// deleted even when they fall outside the newest `keep`. When a protected key is
    /// present, only objects strictly older than it are candidates, so uploads that
    /// landed after it are left alone. Listing failures are returned as
    /// [`ApplicationError::StoreListFailed`]; delete failures only show up as warnings
    /// in the report.
    pub async fn prune(
        &self,
        user_id: &str,
        keep: usize,
        protected: &[String],
    ) -> Result<PruneReport, ApplicationError> {
        let prefix = UserPrefix::parse(user_id)?;
        if keep == 0 {
            return Err(ApplicationError::ValidationError(
                "Retention must keep at least one object".to_string(),
            ));
        }

        let entries = with_deadline(
            self.timeouts.store(),
            "list",
            self.object_store.list(prefix.as_str()),
        )
        .await
        .map_err(|e| {
            tracing::warn!("Retention listing failed for {}: {}", user_id, e);
            ApplicationError::StoreListFailed(e.to_string())
        })?;

        let mut versions: Vec<ObjectEntry> = entries
            .into_iter()
            .filter(|entry| is_versioned_name(&entry.name) && prefix.owns_key(&entry.key))
            .collect();
        sort_newest_first(&mut versions);

        let mut report = PruneReport::default();
        if versions.len() <= keep {
            report.retained = versions.into_iter().map(|entry| entry.key).collect();
            return Ok(report);
        }

        let floor = versions
            .iter()
            .filter(|entry| protected.contains(&entry.key))
            .map(|entry| entry.created_at)
            .max();
        let mut protected: HashSet<String> = protected.iter().cloned().collect();
        match self.live_key(&prefix, &versions).await {
            Ok(Some(key)) => {
                protected.insert(key);
            }
            Ok(None) => {}
            Err(message) => {
                tracing::warn!(
                    "Skipping prune for {}: pointer unavailable: {}",
                    user_id,
                    message
                );
                report.retained = versions.into_iter().map(|entry| entry.key).collect();
                report.warnings.push(AvatarWarning::PointerUnavailable {
                    user_id: user_id.to_string(),
                    message,
                });
                return Ok(report);
            }
        }

        let mut doomed = Vec::new();
        for (index, entry) in versions.into_iter().enumerate() {
            let older_than_floor = floor.is_none_or(|floor| entry.created_at < floor);
            if index < keep || protected.contains(&entry.key) || !older_than_floor {
                report.retained.push(entry.key);
            } else {
                doomed.push(entry.key);
            }
        }

        if doomed.is_empty() {
            return Ok(report);
        }

        match with_deadline(
            self.timeouts.store(),
            "delete",
            self.object_store.delete(&doomed),
        )
        .await
        {
            Ok(()) => {
                tracing::info!("Pruned {} avatar objects for {}", doomed.len(), user_id);
                report.deleted = doomed;
            }
            Err(e) => {
                tracing::warn!("Retention delete failed for {}: {}", user_id, e);
                report.warnings.push(AvatarWarning::StoreDeleteFailed {
                    keys: doomed,
                    message: e.to_string(),
                });
            }
        }

        Ok(report)
    }

    /// Key among `versions` that the profile currently references.
    async fn live_key(
        &self,
        prefix: &UserPrefix,
        versions: &[ObjectEntry],
    ) -> Result<Option<String>, String> {
        let pointer = with_deadline(
            self.timeouts.profile(),
            "profile read",
            self.profile_repository.get_pointer(prefix.as_str()),
        )
        .await
        .map_err(|e| e.to_string())?;

        let Some(url) = pointer.avatar_url else {
            return Ok(None);
        };

        Ok(versions
            .iter()
            .find(|entry| {
                self.object_store
                    .public_url(&entry.key)
                    .is_ok_and(|candidate| candidate == url)
            })
            .map(|entry| entry.key.clone()))
    }
}

/// Newest first; equal timestamps fall back to the key, highest first.
fn sort_newest_first(entries: &mut [ObjectEntry]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.key.cmp(&a.key))
    });
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::domain::clock::Clock;
    use crate::domain::models::avatar::{versioned_name, IMMUTABLE_CACHE_CONTROL};
    use crate::domain::models::profile::AvatarPointerUpdate;
    use crate::test_support::{FlakyObjectStore, FlakyProfileRepository, ManualClock};

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<FlakyObjectStore>,
        profiles: Arc<FlakyProfileRepository>,
        service: AvatarRetentionService,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::starting_at(1_700_000_000_000);
        let store = FlakyObjectStore::new(clock.clone());
        let profiles = FlakyProfileRepository::new();
        let service = AvatarRetentionService::new(
            store.clone(),
            profiles.clone(),
            OperationTimeouts::default(),
        );
        Fixture {
            clock,
            store,
            profiles,
            service,
        }
    }

    /// Store `count` versions one second apart and return their keys, oldest first.
    async fn seed_versions(fixture: &Fixture, user_id: &str, count: usize) -> Vec<String> {
        let mut keys = Vec::new();
        for index in 0..count {
            fixture.clock.advance_secs(1);
            let key = format!(
                "{}/{}",
                user_id,
                versioned_name(fixture.clock.now(), index as u32)
            );
            fixture
                .store
                .put(&key, Bytes::from_static(b"jpeg"), "image/jpeg", IMMUTABLE_CACHE_CONTROL)
                .await
                .expect("seed put");
            keys.push(key);
        }
        keys
    }

    #[tokio::test]
    async fn keeps_the_three_newest_of_five() {
        let fixture = fixture();
        let keys = seed_versions(&fixture, "user-1", 5).await;

        let report = fixture
            .service
            .prune("user-1", 3, &[])
            .await
            .expect("prune");

        assert_eq!(report.retained, vec![keys[4].clone(), keys[3].clone(), keys[2].clone()]);
        assert_eq!(report.deleted.len(), 2);
        assert!(report.warnings.is_empty());

        let remaining: Vec<String> = fixture
            .store
            .inner
            .list("user-1")
            .await
            .expect("list")
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        assert_eq!(remaining.len(), 3);
        assert!(!remaining.contains(&keys[0]));
        assert!(!remaining.contains(&keys[1]));
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let fixture = fixture();
        seed_versions(&fixture, "user-1", 6).await;

        fixture.service.prune("user-1", 2, &[]).await.expect("first");
        let after_first = fixture.store.names("user-1").await;

        let second = fixture.service.prune("user-1", 2, &[]).await.expect("second");
        assert!(second.deleted.is_empty());
        assert_eq!(fixture.store.names("user-1").await, after_first);
    }

    #[tokio::test]
    async fn protected_and_live_keys_survive() {
        let fixture = fixture();
        let keys = seed_versions(&fixture, "user-1", 4).await;
        let live_url = fixture.store.public_url(&keys[1]).expect("url");
        fixture
            .profiles
            .inner
            .update_pointer(
                "user-1",
                &AvatarPointerUpdate::point_to(live_url, Utc::now()),
            )
            .await
            .expect("point");

        let report = fixture
            .service
            .prune("user-1", 1, &[keys[2].clone()])
            .await
            .expect("prune");

        assert_eq!(report.deleted, vec![keys[0].clone()]);
        assert!(fixture.store.inner.contains(&keys[1]).await);
        assert!(fixture.store.inner.contains(&keys[2]).await);
        assert!(fixture.store.inner.contains(&keys[3]).await);
    }

    #[tokio::test]
    async fn uploads_newer_than_the_protected_key_survive() {
        let fixture = fixture();
        let keys = seed_versions(&fixture, "user-1", 5).await;

        let report = fixture
            .service
            .prune("user-1", 1, &[keys[1].clone()])
            .await
            .expect("prune");

        assert_eq!(report.deleted, vec![keys[0].clone()]);
        assert_eq!(report.retained.len(), 4);
    }

    #[tokio::test]
    async fn ties_break_by_key() {
        let fixture = fixture();
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut keys: Vec<String> = (0..3)
            .map(|suffix| format!("user-1/{}", versioned_name(at, suffix)))
            .collect();
        for key in &keys {
            fixture
                .store
                .put(key, Bytes::from_static(b"x"), "image/jpeg", IMMUTABLE_CACHE_CONTROL)
                .await
                .expect("put");
        }

        let report = fixture.service.prune("user-1", 2, &[]).await.expect("prune");

        keys.sort();
        assert_eq!(report.retained, vec![keys[2].clone(), keys[1].clone()]);
        assert_eq!(report.deleted, vec![keys[0].clone()]);
    }

    #[tokio::test]
    async fn ignores_objects_outside_the_versioned_pattern() {
        let fixture = fixture();
        seed_versions(&fixture, "user-1", 2).await;
        for name in ["avatar.jpg", "notes.txt"] {
            fixture
                .store
                .put(&format!("user-1/{}", name), Bytes::from_static(b"x"), "image/jpeg", "no-cache")
                .await
                .expect("put");
        }

        let report = fixture.service.prune("user-1", 1, &[]).await.expect("prune");

        assert_eq!(report.deleted.len(), 1);
        let names = fixture.store.names("user-1").await;
        assert!(names.contains(&"avatar.jpg".to_string()));
        assert!(names.contains(&"notes.txt".to_string()));
    }

    #[tokio::test]
    async fn delete_failure_is_a_warning() {
        let fixture = fixture();
        seed_versions(&fixture, "user-1", 3).await;
        fixture.store.fail_delete.store(true, Ordering::SeqCst);

        let report = fixture.service.prune("user-1", 1, &[]).await.expect("prune");

        assert!(report.deleted.is_empty());
        assert!(matches!(
            report.warnings.as_slice(),
            [AvatarWarning::StoreDeleteFailed { keys, .. }] if keys.len() == 2
        ));
    }

    #[tokio::test]
    async fn unreadable_pointer_prunes_nothing() {
        let fixture = fixture();
        seed_versions(&fixture, "user-1", 3).await;
        fixture.profiles.fail_read.store(true, Ordering::SeqCst);

        let report = fixture.service.prune("user-1", 1, &[]).await.expect("prune");

        assert!(report.deleted.is_empty());
        assert_eq!(fixture.store.names("user-1").await.len(), 3);
        assert!(matches!(
            report.warnings.as_slice(),
            [AvatarWarning::PointerUnavailable { .. }]
        ));
    }

    #[tokio::test]
    async fn list_failure_is_reported() {
        let fixture = fixture();
        fixture.store.fail_list.store(true, Ordering::SeqCst);

        let result = fixture.service.prune("user-1", 3, &[]).await;
        assert!(matches!(result, Err(ApplicationError::StoreListFailed(_))));
    }
}
