use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::models::avatar::NamingPolicy;

/// Tunables of the avatar lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Edge length in pixels of the normalized square
    pub normalized_edge_length: u32,
    /// JPEG quality factor in `(0, 1]`
    pub compression_quality: f32,
    /// Upper bound for the declared and actual upload size
    pub max_upload_bytes: u64,
    /// Versioned objects kept per user after pruning
    pub retention_keep: usize,
    pub naming_policy: NamingPolicy,
    /// Extra probe attempts before a pointer is considered broken
    pub probe_retries: u32,
    pub timeouts: OperationTimeouts,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            normalized_edge_length: 200,
            compression_quality: 0.8,
            max_upload_bytes: 5 * 1024 * 1024,
            retention_keep: 3,
            naming_policy: NamingPolicy::Versioned,
            probe_retries: 1,
            timeouts: OperationTimeouts::default(),
        }
    }
}

impl AvatarConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.normalized_edge_length == 0 {
            return Err(DomainError::InvalidData(
                "normalized_edge_length must be greater than zero".to_string(),
            ));
        }

        if !(self.compression_quality > 0.0 && self.compression_quality <= 1.0) {
            return Err(DomainError::InvalidData(format!(
                "compression_quality must be in (0, 1], got {}",
                self.compression_quality
            )));
        }

        if self.max_upload_bytes == 0 {
            return Err(DomainError::InvalidData(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }

        if self.retention_keep < 1 {
            return Err(DomainError::InvalidData(
                "retention_keep must be at least 1".to_string(),
            ));
        }

        self.timeouts.validate()
    }
}

/// Per-operation timeouts, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimeouts {
    pub normalize_ms: u64,
    pub store_ms: u64,
    pub profile_ms: u64,
    pub probe_ms: u64,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            normalize_ms: 10_000,
            store_ms: 15_000,
            profile_ms: 5_000,
            probe_ms: 5_000,
        }
    }
}

impl OperationTimeouts {
    pub fn normalize(&self) -> Duration {
        Duration::from_millis(self.normalize_ms)
    }

    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    pub fn profile(&self) -> Duration {
        Duration::from_millis(self.profile_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    fn validate(&self) -> Result<(), DomainError> {
        let entries = [
            ("normalize_ms", self.normalize_ms),
            ("store_ms", self.store_ms),
            ("profile_ms", self.profile_ms),
            ("probe_ms", self.probe_ms),
        ];

        match entries.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(DomainError::InvalidData(format!(
                "timeouts.{} must be greater than zero",
                name
            ))),
            None => Ok(()),
        }
    }
}
