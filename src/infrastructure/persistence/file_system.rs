use crate::domain::errors::DomainError;
use crate::infrastructure::logging::logger;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self as tokio_fs, create_dir_all, read_to_string};
use uuid::Uuid;

/// On-disk layout shared by the file-backed adapters.
///
/// ```text
/// {root}/avatars/{user_id}/{name}   objects and their metadata sidecars
/// {root}/profiles/{user_id}.json    profile avatar fields
/// ```
pub struct DataDirectory {
    root: PathBuf,
    objects: PathBuf,
    profiles: PathBuf,
}

impl DataDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self {
            objects: root.join("avatars"),
            profiles: root.join("profiles"),
            root,
        }
    }

    /// Create any missing directories of the layout
    pub async fn initialize(&self) -> Result<(), DomainError> {
        tracing::info!("Preparing data directory at {:?}", self.root);

        for dir in [&self.root, &self.objects, &self.profiles] {
            create_dir_all(dir)
                .await
                .map_err(|e| io_failure("create", dir, e))?;
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the object store; one subdirectory per user
    pub fn objects(&self) -> &Path {
        &self.objects
    }

    pub fn profiles(&self) -> &Path {
        &self.profiles
    }
}

fn io_failure(action: &str, path: &Path, error: std::io::Error) -> DomainError {
    logger::error(&format!("Failed to {} {:?}: {}", action, path, error));
    DomainError::InternalError(format!("Failed to {} {}: {}", action, path.display(), error))
}

/// Deserialize the JSON document at `path`. A missing file maps to `NotFound`.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, DomainError> {
    let contents = match read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DomainError::NotFound(format!("No such file: {}", path.display())));
        }
        Err(e) => return Err(io_failure("read", path, e)),
    };

    serde_json::from_str(&contents).map_err(|e| {
        logger::warn(&format!("Corrupt JSON document {:?}: {}", path, e));
        DomainError::InvalidData(format!("Corrupt JSON in {}: {}", path.display(), e))
    })
}

pub async fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<(), DomainError> {
    let json = serde_json::to_vec_pretty(data)
        .map_err(|e| DomainError::InvalidData(format!("Unserializable document: {}", e)))?;
    write_file_atomic(path, &json).await
}

/// Write to a hidden temporary sibling, then rename it over `path`.
///
/// Readers observe either the previous content or the complete new content.
pub async fn write_file_atomic(path: &Path, data: &[u8]) -> Result<(), DomainError> {
    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return Err(DomainError::InvalidData(format!("Not a file path: {:?}", path)));
    };
    create_dir_all(parent)
        .await
        .map_err(|e| io_failure("create", parent, e))?;

    let staging = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    let written = match tokio_fs::write(&staging, data).await {
        Ok(()) => tokio_fs::rename(&staging, path)
            .await
            .map_err(|e| io_failure("rename into", path, e)),
        Err(e) => Err(io_failure("write", &staging, e)),
    };

    if written.is_err() {
        let _ = tokio_fs::remove_file(&staging).await;
    }
    written
}

/// Regular files directly inside `dir` ending in `.{extension}`. A missing directory is empty.
pub async fn list_files_with_extension(
    dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, DomainError> {
    let mut entries = match tokio_fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_failure("list", dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_failure("list", dir, e))?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.is_ok_and(|kind| kind.is_file());
        if is_file && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }

    Ok(files)
}

/// Remove `path`; a file that is already gone counts as removed.
pub async fn delete_file(path: &Path) -> Result<(), DomainError> {
    match tokio_fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_failure("delete", path, e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rand::random;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
    }

    fn unique_temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("avatar-lifecycle-fs-{}", random::<u64>()))
    }

    #[tokio::test]
    async fn atomic_json_write_leaves_no_temporary_files() {
        let root = unique_temp_root();
        let path = root.join("nested").join("sample.json");

        write_json_file(&path, &Sample { name: "a".into() })
            .await
            .expect("first write");
        write_json_file(&path, &Sample { name: "b".into() })
            .await
            .expect("second write");

        let loaded: Sample = read_json_file(&path).await.expect("read back");
        assert_eq!(loaded.name, "b");

        let mut entries = tokio_fs::read_dir(root.join("nested")).await.expect("read dir");
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.expect("entry") {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["sample.json".to_string()]);

        let _ = tokio_fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn initialize_creates_the_layout() {
        let data = DataDirectory::new(unique_temp_root());
        data.initialize().await.expect("initialize");
        data.initialize().await.expect("initialize twice");

        assert!(data.objects().is_dir());
        assert!(data.profiles().is_dir());
        assert!(list_files_with_extension(data.profiles(), "json")
            .await
            .expect("list")
            .is_empty());

        let _ = tokio_fs::remove_dir_all(data.root()).await;
    }

    #[tokio::test]
    async fn missing_json_file_is_not_found() {
        let root = unique_temp_root();
        let result = read_json_file::<Sample>(&root.join("missing.json")).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(delete_file(&root.join("missing.json")).await.is_ok());
    }
}
