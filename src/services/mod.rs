mod error;
mod local_storage;

pub use error::StorageError;
pub use local_storage::LocalStorageService;

use std::sync::Arc;

use crate::{application::services::StorageService, domain::config::local::LocalConfig};

pub async fn create_storage_service(
    config: &LocalConfig,
) -> Result<Arc<dyn StorageService>, StorageError> {
    let service = LocalStorageService::new(&config.storage_root, config.duplicate_policy).await?;
    Ok(Arc::new(service))
}
