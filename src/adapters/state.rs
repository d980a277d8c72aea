use axum::{
    extract::FromRef,
    http::{header, HeaderMap},
};
use std::sync::Arc;

use crate::{application::services::StorageService, domain::config::local::LocalConfig};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<LocalConfig>,
    pub storage_service: Arc<dyn StorageService>,
}

impl AppState {
    pub fn new(config: LocalConfig, storage_service: Arc<dyn StorageService>) -> Self {
        Self {
            config: Arc::new(config),
            storage_service,
        }
    }

    /// `scheme://host` prefix for links handed back to clients.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(public_url) = &self.config.public_url {
            return public_url.clone();
        }

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.bind_address());

        format!("http://{}", host)
    }
}
