use async_trait::async_trait;

use crate::domain::errors::DomainError;
use crate::domain::models::profile::{AvatarPointerUpdate, ProfileAvatarRef};

/// Narrow view of the profile record store: only the avatar fields are reachable.
#[async_trait]
pub trait ProfilePointerRepository: Send + Sync {
    /// Current avatar fields of a profile. Unknown users yield an empty reference.
    async fn get_pointer(&self, user_id: &str) -> Result<ProfileAvatarRef, DomainError>;

    /// Overwrite `avatar_url` and `avatar_updated_at` of one profile.
    async fn update_pointer(
        &self,
        user_id: &str,
        update: &AvatarPointerUpdate,
    ) -> Result<(), DomainError>;

    /// Every user id with a profile row.
    async fn list_user_ids(&self) -> Result<Vec<String>, DomainError>;
}
