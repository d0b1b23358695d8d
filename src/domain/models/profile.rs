use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The avatar fields of a profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAvatarRef {
    pub user_id: String,
    pub avatar_url: Option<String>,
    pub avatar_updated_at: Option<DateTime<Utc>>,
}

impl ProfileAvatarRef {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            avatar_url: None,
            avatar_updated_at: None,
        }
    }

    pub fn apply(&mut self, update: &AvatarPointerUpdate) {
        self.avatar_url = update.avatar_url.clone();
        self.avatar_updated_at = Some(update.avatar_updated_at);
    }
}

/// Single field-group write against a profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarPointerUpdate {
    pub avatar_url: Option<String>,
    pub avatar_updated_at: DateTime<Utc>,
}

impl AvatarPointerUpdate {
    pub fn point_to(url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            avatar_url: Some(url.into()),
            avatar_updated_at: at,
        }
    }

    pub fn clear(at: DateTime<Utc>) -> Self {
        Self {
            avatar_url: None,
            avatar_updated_at: at,
        }
    }
}
