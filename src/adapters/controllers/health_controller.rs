use axum::{extract::State, Json};
use serde::Serialize;
use sysinfo::System;
use tracing::info;

use crate::{adapters::state::AppState, application::error::ApplicationError};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(rename = "storageRoot")]
    pub storage_root: String,
    #[serde(rename = "fileCount")]
    pub file_count: usize,
    pub metrics: SystemMetrics,
}

#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    #[serde(rename = "cpuUsagePercent")]
    pub cpu_usage_percent: f32,
    #[serde(rename = "memoryUsedBytes")]
    pub memory_used_bytes: u64,
    #[serde(rename = "memoryTotalBytes")]
    pub memory_total_bytes: u64,
    #[serde(rename = "memoryUsagePercent")]
    pub memory_usage_percent: f32,
}

pub struct HealthController;

impl HealthController {
    /// GET /health
    /// Fails when the storage root can no longer be read.
    pub async fn health_check(
        State(app_state): State<AppState>,
    ) -> Result<Json<HealthResponse>, ApplicationError> {
        info!("Health check requested");

        let file_count = app_state.storage_service.list().await?.len();

        // Only refresh what's needed
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let memory_used = sys.used_memory();
        let memory_total = sys.total_memory();
        let memory_usage_percent = if memory_total > 0 {
            (memory_used as f32 / memory_total as f32) * 100.0
        } else {
            0.0
        };

        Ok(Json(HealthResponse {
            status: "healthy".to_string(),
            storage_root: app_state.config.storage_root.display().to_string(),
            file_count,
            metrics: SystemMetrics {
                cpu_usage_percent: sys.global_cpu_usage(),
                memory_used_bytes: memory_used,
                memory_total_bytes: memory_total,
                memory_usage_percent,
            },
        }))
    }
}
