use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::application::services::avatar_service::AvatarService;
use crate::domain::errors::DomainError;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::object_server::ObjectServer;
use crate::infrastructure::persistence::file_system::DataDirectory;

mod bootstrap;

pub struct AppState {
    pub config: AppConfig,
    pub data_directory: DataDirectory,
    pub avatar_service: Arc<AvatarService>,
    pub object_server: ObjectServer,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, DomainError> {
        tracing::info!("Initializing application with data root: {:?}", config.data_root);

        let data_directory = bootstrap::initialize_data_directory(&config.data_root).await?;
        let services = bootstrap::build_services(&config, &data_directory)?;
        let object_server = ObjectServer::new(services.object_store, &config.mount_path()?);

        tracing::info!("Application initialized successfully");

        Ok(Self {
            config,
            data_directory,
            avatar_service: services.avatar_service,
            object_server,
        })
    }

    pub async fn start_object_server(&self) -> Result<SocketAddr, DomainError> {
        self.object_server
            .start(self.config.socket_address()?)
            .await
    }
}

/// Run `verify_all` every `interval`. The first sweep runs one interval after start.
pub fn spawn_link_health_sweep(
    avatar_service: Arc<AvatarService>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match avatar_service.verify_all().await {
                Ok(report) => {
                    for warning in &report.warnings {
                        tracing::warn!("Link health sweep: {}", warning);
                    }
                }
                Err(error) => tracing::error!("Link health sweep failed: {}", error),
            }
        }
    })
}
