use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::errors::DomainError;
use crate::domain::models::profile::{AvatarPointerUpdate, ProfileAvatarRef};
use crate::domain::repositories::profile_repository::ProfilePointerRepository;

#[derive(Default)]
pub struct MemoryProfileRepository {
    profiles: RwLock<BTreeMap<String, ProfileAvatarRef>>,
}

impl MemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile row, replacing any existing one.
    pub async fn insert(&self, profile: ProfileAvatarRef) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfilePointerRepository for MemoryProfileRepository {
    async fn get_pointer(&self, user_id: &str) -> Result<ProfileAvatarRef, DomainError> {
        Ok(self
            .profiles
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| ProfileAvatarRef::empty(user_id)))
    }

    async fn update_pointer(
        &self,
        user_id: &str,
        update: &AvatarPointerUpdate,
    ) -> Result<(), DomainError> {
        self.profiles
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| ProfileAvatarRef::empty(user_id))
            .apply(update);
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, DomainError> {
        Ok(self.profiles.read().await.keys().cloned().collect())
    }
}
