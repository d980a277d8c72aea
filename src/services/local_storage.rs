use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};
use tracing::{error, info, warn};

use crate::{
    application::{
        error::ApplicationError,
        services::{StorageService, UploadStream},
    },
    domain::{
        config::local::DuplicatePolicy,
        models::file::{is_valid_original_name, partial_name, StoredFile, PARTIAL_PREFIX},
    },
    services::error::StorageError,
};

const MAX_IDENTIFIER_ATTEMPTS: usize = 8;

/// Flat-directory store. The directory listing is the index: every record is
/// a regular file named `<identifier>_<original_name>` directly under `root`.
pub struct LocalStorageService {
    root: PathBuf,
    duplicate_policy: DuplicatePolicy,
    // Serializes the duplicate/collision checks with the rename into place.
    commit_lock: Mutex<()>,
}

impl LocalStorageService {
    /// Opens the store, creating `root` (and its parents) when missing.
    /// Partial uploads left by a previous process are deleted.
    pub async fn new(
        root: impl Into<PathBuf>,
        duplicate_policy: DuplicatePolicy,
    ) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(StorageError::Io)?;
        remove_stale_partials(&root).await?;

        info!(
            "Storage root ready at {} (duplicate names: {:?})",
            root.display(),
            duplicate_policy
        );

        Ok(Self {
            root,
            duplicate_policy,
            commit_lock: Mutex::new(()),
        })
    }

    fn path_of(&self, file: &StoredFile) -> PathBuf {
        self.root.join(file.disk_name())
    }

    async fn entries(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut dir = fs::read_dir(&self.root).await.map_err(StorageError::Io)?;
        let mut files = Vec::new();

        while let Some(entry) = dir.next_entry().await.map_err(StorageError::Io)? {
            if entry.file_type().await.map_err(StorageError::Io)?.is_dir() {
                continue;
            }

            let disk_name = entry.file_name();
            let Some(disk_name) = disk_name.to_str() else {
                continue;
            };

            if let Some(file) = StoredFile::from_disk_name(disk_name) {
                files.push(file);
            }
        }

        files.sort_by_key(StoredFile::disk_name);
        Ok(files)
    }

    async fn name_in_use(&self, original_name: &str) -> Result<bool, StorageError> {
        Ok(self
            .entries()
            .await?
            .iter()
            .any(|file| file.original_name == original_name))
    }

    async fn write_partial(
        &self,
        path: &Path,
        content: &mut UploadStream<'_>,
    ) -> Result<u64, StorageError> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(StorageError::Io)?;

        let written = tokio::io::copy(content, &mut file)
            .await
            .map_err(StorageError::Io)?;
        file.sync_all().await.map_err(StorageError::Io)?;

        Ok(written)
    }

    async fn commit(
        &self,
        partial: &Path,
        original_name: &str,
    ) -> Result<StoredFile, StorageError> {
        let _guard = self.commit_lock.lock().await;

        let reject_duplicates = self.duplicate_policy == DuplicatePolicy::Reject;
        if reject_duplicates && self.name_in_use(original_name).await? {
            warn!("File {} already exists. Upload canceled.", original_name);
            return Err(StorageError::AlreadyExists(original_name.to_string()));
        }

        for _ in 0..MAX_IDENTIFIER_ATTEMPTS {
            let file = StoredFile::generate(original_name);
            let target = self.path_of(&file);

            if fs::try_exists(&target).await.map_err(StorageError::Io)? {
                warn!("Identifier collision on {}, regenerating", file.disk_name());
                continue;
            }

            fs::rename(partial, &target).await.map_err(StorageError::Io)?;
            return Ok(file);
        }

        Err(StorageError::InternalError(format!(
            "no free identifier for {} after {} attempts",
            original_name, MAX_IDENTIFIER_ATTEMPTS
        )))
    }
}

async fn remove_stale_partials(root: &Path) -> Result<(), StorageError> {
    let mut dir = fs::read_dir(root).await.map_err(StorageError::Io)?;

    while let Some(entry) = dir.next_entry().await.map_err(StorageError::Io)? {
        let is_partial = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(PARTIAL_PREFIX));
        if !is_partial || entry.file_type().await.map_err(StorageError::Io)?.is_dir() {
            continue;
        }

        warn!("Removing stale partial upload {}", entry.path().display());
        fs::remove_file(entry.path())
            .await
            .map_err(StorageError::Io)?;
    }

    Ok(())
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn store(
        &self,
        original_name: &str,
        content: &mut UploadStream<'_>,
    ) -> Result<StoredFile, ApplicationError> {
        if !is_valid_original_name(original_name) {
            return Err(StorageError::InvalidName(format!("'{}'", original_name)).into());
        }

        let partial = PartialFile::new(self.root.join(partial_name()));

        let size = self
            .write_partial(partial.path(), content)
            .await
            .inspect_err(|e| error!("Failed to write upload {}: {}", original_name, e))?;

        let file = self.commit(partial.path(), original_name).await?;
        partial.keep();

        info!("Stored {} ({} bytes)", file.disk_name(), size);
        Ok(file)
    }

    async fn retrieve(&self, file: &StoredFile) -> Result<PathBuf, ApplicationError> {
        if !file.is_addressable() {
            return Err(ApplicationError::NotFound);
        }

        let path = self.path_of(file);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(ApplicationError::NotFound),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    async fn remove(&self, file: &StoredFile) -> Result<(), ApplicationError> {
        let path = self.retrieve(file).await?;

        fs::remove_file(&path).await.map_err(|e| {
            error!("Failed to delete {}: {}", file.disk_name(), e);
            StorageError::from(e)
        })?;

        info!("Deleted {}", file.disk_name());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredFile>, ApplicationError> {
        let files = self.entries().await.inspect_err(|e| {
            error!("Failed to list {}: {}", self.root.display(), e);
        })?;
        Ok(files)
    }
}

/// In-flight upload file, removed on drop unless kept.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove partial upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
