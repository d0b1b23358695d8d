pub mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use app::{spawn_link_health_sweep, AppState};
use infrastructure::config::AppConfig;
use infrastructure::logging::logger;

pub use application::dto::avatar_dto::{
    AvatarUploadResult, PruneReport, RemovalReport, SweepReport, UploadAvatarDto, VerifyOutcome,
};
pub use application::errors::{ApplicationError, AvatarWarning};
pub use application::services::avatar_service::AvatarService;
pub use domain::models::config::AvatarConfig;

/// Run the daemon until ctrl-c: serve stored objects and sweep broken avatar links.
pub async fn run(config_path: Option<String>) -> Result<(), String> {
    let config = match AppConfig::resolve_path(config_path) {
        Some(path) => AppConfig::load(&path).await.map_err(|e| e.to_string())?,
        None => AppConfig::default(),
    };

    if let Err(error) = logger::init_logger(&config.log_dir()) {
        eprintln!("Failed to initialize logger: {}", error);
    }

    tracing::info!("Starting avatar lifecycle daemon");

    let state = AppState::new(config).await.map_err(|e| e.to_string())?;
    let addr = state
        .start_object_server()
        .await
        .map_err(|e| e.to_string())?;
    logger::info(&format!(
        "Serving avatars on {} as {}",
        addr, state.config.public_base_url
    ));

    let sweep = match state.config.verify_interval_secs {
        0 => {
            logger::info("Link health sweep disabled");
            None
        }
        secs => Some(spawn_link_health_sweep(
            state.avatar_service.clone(),
            Duration::from_secs(secs),
        )),
    };

    if let Err(error) = tokio::signal::ctrl_c().await {
        logger::error(&format!("Failed to listen for shutdown signal: {}", error));
    }

    tracing::info!("Shutting down");
    if let Some(sweep) = sweep {
        sweep.abort();
    }
    state.object_server.stop().await;
    Ok(())
}
