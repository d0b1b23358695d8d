use std::path::Path;
use std::sync::Arc;

use crate::application::services::avatar_service::AvatarService;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::errors::DomainError;
use crate::domain::repositories::object_store::ObjectStore;
use crate::domain::repositories::profile_repository::ProfilePointerRepository;
use crate::domain::repositories::reachability_probe::ReachabilityProbe;
use crate::infrastructure::apis::http_reachability_probe::HttpReachabilityProbe;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::persistence::file_system::DataDirectory;
use crate::infrastructure::repositories::file_object_store::FileObjectStore;
use crate::infrastructure::repositories::file_profile_repository::FileProfileRepository;

pub(super) struct AppServices {
    pub avatar_service: Arc<AvatarService>,
    pub object_store: Arc<FileObjectStore>,
}

struct AppRepositories {
    object_store: Arc<FileObjectStore>,
    profile_repository: Arc<dyn ProfilePointerRepository>,
    probe: Arc<dyn ReachabilityProbe>,
}

pub(super) async fn initialize_data_directory(
    data_root: &Path,
) -> Result<DataDirectory, DomainError> {
    let data_directory = DataDirectory::new(data_root.to_path_buf());
    data_directory.initialize().await?;
    Ok(data_directory)
}

pub(super) fn build_services(
    config: &AppConfig,
    data_directory: &DataDirectory,
) -> Result<AppServices, DomainError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repositories = build_repositories(config, data_directory, clock.clone())?;

    let object_store: Arc<dyn ObjectStore> = repositories.object_store.clone();
    let avatar_service = Arc::new(AvatarService::new(
        object_store,
        repositories.profile_repository,
        repositories.probe,
        clock,
        config.avatar.clone(),
    ));

    Ok(AppServices {
        avatar_service,
        object_store: repositories.object_store,
    })
}

fn build_repositories(
    config: &AppConfig,
    data_directory: &DataDirectory,
    clock: Arc<dyn Clock>,
) -> Result<AppRepositories, DomainError> {
    let object_store = Arc::new(FileObjectStore::with_clock(
        data_directory.objects().to_path_buf(),
        &config.public_base_url,
        clock,
    )?);
    let profile_repository: Arc<dyn ProfilePointerRepository> = Arc::new(
        FileProfileRepository::new(data_directory.profiles().to_path_buf()),
    );
    let probe: Arc<dyn ReachabilityProbe> =
        Arc::new(HttpReachabilityProbe::new(config.avatar.timeouts.probe())?);

    Ok(AppRepositories {
        object_store,
        profile_repository,
        probe,
    })
}
