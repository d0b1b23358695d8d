use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::errors::DomainError;
use crate::domain::models::config::AvatarConfig;

pub const CONFIG_ENV_VAR: &str = "AVATAR_LIFECYCLE_CONFIG";

/// Daemon settings. Every field has a default so an empty document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_root: PathBuf,
    pub bind_address: String,
    /// Base of the public object URLs; its path is where the object server is mounted
    pub public_base_url: String,
    /// Seconds between link health sweeps, `0` disables them
    pub verify_interval_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub avatar: AvatarConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            bind_address: "127.0.0.1:8787".to_string(),
            public_base_url: "http://127.0.0.1:8787/avatars/".to_string(),
            verify_interval_secs: 3600,
            log_dir: None,
            avatar: AvatarConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load a YAML (or JSON) document and validate it.
    pub async fn load(path: &Path) -> Result<Self, DomainError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::InternalError(format!("Failed to read config {:?}: {}", path, e))
        })?;

        let config = Self::parse(&content)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, DomainError> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| DomainError::InvalidData(format!("Invalid config: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Explicit path first, then the environment; `None` means built-in defaults.
    pub fn resolve_path(explicit: Option<String>) -> Option<PathBuf> {
        explicit
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.socket_address()?;
        self.base_url()?;
        self.avatar.validate()
    }

    pub fn socket_address(&self) -> Result<SocketAddr, DomainError> {
        self.bind_address.parse().map_err(|e| {
            DomainError::InvalidData(format!(
                "bind_address {:?} is not a socket address: {}",
                self.bind_address, e
            ))
        })
    }

    pub fn base_url(&self) -> Result<Url, DomainError> {
        let url = Url::parse(&self.public_base_url).map_err(|e| {
            DomainError::InvalidData(format!(
                "public_base_url {:?} is not a URL: {}",
                self.public_base_url, e
            ))
        })?;

        if url.cannot_be_a_base() || url.query().is_some() || url.fragment().is_some() {
            return Err(DomainError::InvalidData(format!(
                "public_base_url {:?} must be a plain base URL",
                self.public_base_url
            )));
        }

        Ok(url)
    }

    /// Router mount path derived from the public base URL, e.g. `/avatars`.
    pub fn mount_path(&self) -> Result<String, DomainError> {
        let url = self.base_url()?;
        Ok(url.path().trim_end_matches('/').to_string())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join("logs"))
    }
}
