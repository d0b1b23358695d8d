use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::errors::AvatarWarning;

/// An upload as received from the caller. Validated, normalized, then dropped.
#[derive(Debug, Clone)]
pub struct UploadAvatarDto {
    pub bytes: Bytes,
    /// Content type claimed by the client
    pub content_type: String,
    /// Size claimed by the client
    pub declared_size: u64,
}

impl UploadAvatarDto {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        let bytes = bytes.into();
        Self {
            declared_size: bytes.len() as u64,
            bytes,
            content_type: content_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvatarUploadResult {
    pub url: String,
    pub key: String,
    pub updated_at: DateTime<Utc>,
    pub warnings: Vec<AvatarWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Retained keys, newest first
    pub retained: Vec<String>,
    pub deleted: Vec<String>,
    pub warnings: Vec<AvatarWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyOutcome {
    Ok,
    /// The pointer was unreachable and has been set to null
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub cleared: Vec<String>,
    pub warnings: Vec<AvatarWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub deleted: Vec<String>,
    pub warnings: Vec<AvatarWarning>,
}
