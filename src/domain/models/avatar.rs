use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Content type of every normalized avatar object.
pub const AVATAR_CONTENT_TYPE: &str = "image/jpeg";

/// File extension matching [`AVATAR_CONTENT_TYPE`].
pub const AVATAR_EXTENSION: &str = "jpg";

/// Object name used by the single-slot naming policy.
pub const SINGLE_SLOT_NAME: &str = "avatar.jpg";

const VERSIONED_PREFIX: &str = "avatar-";

/// Cache directive for keys whose bytes never change after creation.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Cache directive for the overwritten single slot.
pub const SLOT_CACHE_CONTROL: &str = "public, max-age=3600";

/// How avatar objects are named under a user's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// One fixed object per user, replaced on every upload.
    SingleSlot,
    /// A new object per upload, pruned later by retention.
    #[default]
    Versioned,
}

impl NamingPolicy {
    pub fn cache_control(&self) -> &'static str {
        match self {
            NamingPolicy::SingleSlot => SLOT_CACHE_CONTROL,
            NamingPolicy::Versioned => IMMUTABLE_CACHE_CONTROL,
        }
    }
}

/// Square crop window inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// Entry returned when listing a user's prefix in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Name relative to the listed prefix
    pub name: String,
    /// Full storage key (`{prefix}/{name}`)
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Metadata kept alongside every stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub content_type: String,
    pub cache_control: String,
    pub size_bytes: u64,
}

/// Validated storage prefix of a single user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserPrefix(String);

impl UserPrefix {
    /// Accept a user id only if it cannot escape its own key prefix.
    ///
    /// Leading dots are refused as well; the file store hides dot entries.
    pub fn parse(user_id: &str) -> Result<Self, DomainError> {
        let trimmed = user_id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidData("User id is empty".to_string()));
        }

        if trimmed != user_id
            || user_id.starts_with('.')
            || user_id
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(DomainError::InvalidData(format!(
                "User id cannot be used as a storage prefix: {:?}",
                user_id
            )));
        }

        Ok(Self(user_id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn key_for(&self, name: &str) -> String {
        format!("{}/{}", self.0, name)
    }

    pub fn single_slot_key(&self) -> String {
        self.key_for(SINGLE_SLOT_NAME)
    }

    /// Build a versioned key from the capture time and a random suffix.
    pub fn versioned_key(&self, captured_at: DateTime<Utc>, suffix: u32) -> String {
        self.key_for(&versioned_name(captured_at, suffix))
    }

    pub fn owns_key(&self, key: &str) -> bool {
        key.strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// `avatar-{millis:013}-{suffix:08x}.jpg`; zero padding keeps lexical and time order aligned.
pub fn versioned_name(captured_at: DateTime<Utc>, suffix: u32) -> String {
    format!(
        "{}{:013}-{:08x}.{}",
        VERSIONED_PREFIX,
        captured_at.timestamp_millis().max(0),
        suffix,
        AVATAR_EXTENSION
    )
}

/// Capture time encoded in a versioned name, or `None` for anything else.
pub fn parse_versioned_name(name: &str) -> Option<i64> {
    let stem = name
        .strip_prefix(VERSIONED_PREFIX)?
        .strip_suffix(AVATAR_EXTENSION)?
        .strip_suffix('.')?;
    let (millis, suffix) = stem.split_once('-')?;

    if millis.len() != 13 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if suffix.len() != 8 || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    millis.parse().ok()
}

pub fn is_versioned_name(name: &str) -> bool {
    parse_versioned_name(name).is_some()
}

/// Whether a listed name is any avatar object this subsystem created.
pub fn is_avatar_name(name: &str) -> bool {
    name == SINGLE_SLOT_NAME || is_versioned_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn versioned_name_round_trips_capture_time() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let name = versioned_name(at, 0xdead_beef);

        assert_eq!(name, "avatar-1700000000123-deadbeef.jpg");
        assert_eq!(parse_versioned_name(&name), Some(1_700_000_000_123));
    }

    #[test]
    fn foreign_names_are_not_versioned() {
        assert!(!is_versioned_name("avatar.jpg"));
        assert!(!is_versioned_name("avatar-123-deadbeef.jpg"));
        assert!(!is_versioned_name("avatar-1700000000123-deadbeef.png"));
        assert!(!is_versioned_name("cover-1700000000123-deadbeef.jpg"));
        assert!(is_avatar_name("avatar.jpg"));
    }

    #[test]
    fn user_prefix_rejects_escaping_ids() {
        assert!(UserPrefix::parse("").is_err());
        assert!(UserPrefix::parse("..").is_err());
        assert!(UserPrefix::parse(".alice").is_err());
        assert!(UserPrefix::parse("a/b").is_err());
        assert!(UserPrefix::parse("a\\b").is_err());
        assert!(UserPrefix::parse(" padded").is_err());

        let prefix = UserPrefix::parse("user-1").expect("valid id");
        assert_eq!(prefix.single_slot_key(), "user-1/avatar.jpg");
        assert!(prefix.owns_key("user-1/avatar.jpg"));
        assert!(!prefix.owns_key("user-10/avatar.jpg"));
    }
}
