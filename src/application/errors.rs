use serde::Serialize;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("Invalid input type: {0}")]
    InvalidInputType(String),

    #[error("Payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Normalization failed: {0}")]
    NormalizationFailed(String),

    #[error("Store write failed: {0}")]
    StoreWriteFailed(String),

    /// The object at `key` was written but the profile does not reference it.
    #[error("Pointer update failed: {message}")]
    PointerUpdateFailed {
        key: Option<String>,
        url: Option<String>,
        message: String,
    },

    #[error("Store list failed: {0}")]
    StoreListFailed(String),

    #[error("Profile read failed: {0}")]
    ProfileReadFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<DomainError> for ApplicationError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidData(msg) => ApplicationError::ValidationError(msg),
            DomainError::NotFound(msg) => ApplicationError::InternalError(msg),
            DomainError::Timeout(msg) => ApplicationError::InternalError(msg),
            DomainError::InternalError(msg) => ApplicationError::InternalError(msg),
        }
    }
}

/// Non-fatal conditions raised by housekeeping. Callers may surface or ignore them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvatarWarning {
    StoreListFailed { prefix: String, message: String },
    StoreDeleteFailed { keys: Vec<String>, message: String },
    ProbeFailed { url: String, message: String },
    /// An object left in the store without a profile referencing it.
    OrphanRetained { key: String, message: String },
    VerifyFailed { user_id: String, message: String },
    /// The live pointer could not be read, so nothing was pruned.
    PointerUnavailable { user_id: String, message: String },
}

impl std::fmt::Display for AvatarWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvatarWarning::StoreListFailed { prefix, message } => {
                write!(f, "listing {} failed: {}", prefix, message)
            }
            AvatarWarning::StoreDeleteFailed { keys, message } => {
                write!(f, "deleting {} failed: {}", keys.join(", "), message)
            }
            AvatarWarning::ProbeFailed { url, message } => {
                write!(f, "probe of {} failed: {}", url, message)
            }
            AvatarWarning::OrphanRetained { key, message } => {
                write!(f, "orphan {} retained: {}", key, message)
            }
            AvatarWarning::VerifyFailed { user_id, message } => {
                write!(f, "verifying {} failed: {}", user_id, message)
            }
            AvatarWarning::PointerUnavailable { user_id, message } => {
                write!(f, "pointer of {} unavailable: {}", user_id, message)
            }
        }
    }
}
