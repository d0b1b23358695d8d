use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

use crate::domain::errors::DomainError;
use crate::domain::models::avatar::UserPrefix;
use crate::domain::models::profile::{AvatarPointerUpdate, ProfileAvatarRef};
use crate::domain::repositories::profile_repository::ProfilePointerRepository;
use crate::infrastructure::persistence::file_system::{
    list_files_with_extension, read_json_file, write_json_file,
};

/// Profile avatar fields stored as one JSON document per user.
pub struct FileProfileRepository {
    profiles_dir: PathBuf,
    cache: Arc<Mutex<HashMap<String, ProfileAvatarRef>>>,
}

impl FileProfileRepository {
    pub fn new(profiles_dir: PathBuf) -> Self {
        Self {
            profiles_dir,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn ensure_directory_exists(&self) -> Result<(), DomainError> {
        if !self.profiles_dir.exists() {
            tracing::info!("Creating profiles directory: {:?}", self.profiles_dir);
            fs::create_dir_all(&self.profiles_dir).await.map_err(|e| {
                tracing::error!("Failed to create profiles directory: {}", e);
                DomainError::InternalError(format!("Failed to create profiles directory: {}", e))
            })?;
        }
        Ok(())
    }

    fn get_profile_path(&self, prefix: &UserPrefix) -> PathBuf {
        self.profiles_dir.join(format!("{}.json", prefix.as_str()))
    }

    async fn load_profile(&self, prefix: &UserPrefix) -> Result<ProfileAvatarRef, DomainError> {
        match read_json_file::<ProfileAvatarRef>(&self.get_profile_path(prefix)).await {
            Ok(profile) => Ok(profile),
            Err(DomainError::NotFound(_)) => Ok(ProfileAvatarRef::empty(prefix.as_str())),
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl ProfilePointerRepository for FileProfileRepository {
    async fn get_pointer(&self, user_id: &str) -> Result<ProfileAvatarRef, DomainError> {
        let prefix = UserPrefix::parse(user_id)?;

        {
            let cache = self.cache.lock().await;
            if let Some(profile) = cache.get(user_id) {
                return Ok(profile.clone());
            }
        }

        let profile = self.load_profile(&prefix).await?;
        self.cache
            .lock()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| profile.clone());

        Ok(profile)
    }

    async fn update_pointer(
        &self,
        user_id: &str,
        update: &AvatarPointerUpdate,
    ) -> Result<(), DomainError> {
        let prefix = UserPrefix::parse(user_id)?;
        self.ensure_directory_exists().await?;

        // Held across the write so the cache never disagrees with the file
        let mut cache = self.cache.lock().await;
        let mut profile = match cache.get(user_id) {
            Some(profile) => profile.clone(),
            None => self.load_profile(&prefix).await?,
        };
        profile.apply(update);

        write_json_file(&self.get_profile_path(&prefix), &profile).await?;
        cache.insert(user_id.to_string(), profile);

        tracing::debug!(
            "Avatar pointer updated for {}: {:?}",
            user_id,
            update.avatar_url
        );
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, DomainError> {
        let files = list_files_with_extension(&self.profiles_dir, "json").await?;

        let mut user_ids: Vec<String> = files
            .iter()
            .filter_map(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.starts_with('.'))
            .collect();
        user_ids.sort();

        Ok(user_ids)
    }
}
