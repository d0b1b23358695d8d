//! Fakes shared by the service tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::Arc;

use crate::domain::clock::Clock;
use crate::domain::errors::DomainError;
use crate::domain::models::avatar::ObjectEntry;
use crate::domain::models::profile::{AvatarPointerUpdate, ProfileAvatarRef};
use crate::domain::repositories::object_store::ObjectStore;
use crate::domain::repositories::profile_repository::ProfilePointerRepository;
use crate::domain::repositories::reachability_probe::ReachabilityProbe;
use crate::infrastructure::repositories::memory_object_store::MemoryObjectStore;
use crate::infrastructure::repositories::memory_profile_repository::MemoryProfileRepository;

pub(crate) use crate::infrastructure::persistence::avatar_image::encode_test_png;

/// Clock that only moves when told to.
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn starting_at(millis: i64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicI64::new(millis),
        })
    }

    pub fn advance_secs(&self, secs: i64) {
        self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}

/// In-memory store with switchable failures and call counters.
pub struct FlakyObjectStore {
    pub inner: MemoryObjectStore,
    pub fail_put: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Delay applied to every `list` call, in milliseconds.
    pub list_delay_ms: AtomicU64,
    pub calls: AtomicUsize,
}

impl FlakyObjectStore {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryObjectStore::with_clock(clock),
            fail_put: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            list_delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn names(&self, user_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .list(user_id)
            .await
            .expect("list")
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        names.sort();
        names
    }

    fn injected(&self, flag: &AtomicBool, operation: &str) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            Err(DomainError::InternalError(format!("injected {} failure", operation)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<String, DomainError> {
        self.injected(&self.fail_put, "put")?;
        self.inner.put(key, bytes, content_type, cache_control).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, DomainError> {
        self.injected(&self.fail_list, "list")?;
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.list(prefix).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), DomainError> {
        self.injected(&self.fail_delete, "delete")?;
        self.inner.delete(keys).await
    }

    fn public_url(&self, key: &str) -> Result<String, DomainError> {
        self.inner.public_url(key)
    }
}

#[async_trait]
impl ReachabilityProbe for FlakyObjectStore {
    async fn probe(&self, url: &str) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.probe(url).await
    }
}

/// In-memory profiles with a switchable update failure.
#[derive(Default)]
pub struct FlakyProfileRepository {
    pub inner: MemoryProfileRepository,
    pub fail_update: AtomicBool,
    pub fail_read: AtomicBool,
    pub updates: AtomicUsize,
}

impl FlakyProfileRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn url_of(&self, user_id: &str) -> Option<String> {
        self.inner
            .get_pointer(user_id)
            .await
            .expect("get pointer")
            .avatar_url
    }
}

#[async_trait]
impl ProfilePointerRepository for FlakyProfileRepository {
    async fn get_pointer(&self, user_id: &str) -> Result<ProfileAvatarRef, DomainError> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(DomainError::InternalError("injected read failure".to_string()));
        }
        self.inner.get_pointer(user_id).await
    }

    async fn update_pointer(
        &self,
        user_id: &str,
        update: &AvatarPointerUpdate,
    ) -> Result<(), DomainError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(DomainError::InternalError("injected update failure".to_string()));
        }
        self.inner.update_pointer(user_id, update).await
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, DomainError> {
        self.inner.list_user_ids().await
    }
}
