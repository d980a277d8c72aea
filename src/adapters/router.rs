use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::{
    adapters::{
        controllers::{file_controller::FileController, health_controller::HealthController},
        middleware::log_requests,
        state::AppState,
    },
    domain::config::local::LocalConfig,
};

pub fn build_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);
    let body_limit = DefaultBodyLimit::max(app_state.config.max_upload_size);

    Router::new()
        .route("/upload", post(FileController::upload_file))
        .route(
            "/file/{id}/{name}",
            get(FileController::download_file).delete(FileController::delete_file),
        )
        .route("/files", get(FileController::list_files))
        .route("/health", get(HealthController::health_check))
        .layer(body_limit)
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(app_state)
}

fn cors_layer(config: &LocalConfig) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(allowed_origins) => {
            let origins: Vec<HeaderValue> = allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        // Allow all origins if not specified (only for development)
        None => CorsLayer::permissive(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::{
        multipart::{MultipartForm, Part},
        TestServer,
    };
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        adapters::dto::file_dto::FileResponse,
        domain::config::local::DuplicatePolicy,
        services::LocalStorageService,
    };

    const PUBLIC_URL: &str = "http://files.test";

    async fn create_test_app(config: LocalConfig) -> (TempDir, TestServer) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = LocalConfig {
            storage_root: temp_dir.path().join("uploads"),
            ..config
        };
        let storage = LocalStorageService::new(&config.storage_root, config.duplicate_policy)
            .await
            .unwrap();
        let app_state = AppState::new(config, Arc::new(storage));
        let server = TestServer::new(build_router(app_state)).unwrap();
        (temp_dir, server)
    }

    fn test_config() -> LocalConfig {
        LocalConfig {
            public_url: Some(PUBLIC_URL.to_string()),
            ..LocalConfig::default()
        }
    }

    fn file_form(name: &str, content: &[u8]) -> MultipartForm {
        MultipartForm::new().add_part("file", Part::bytes(content.to_vec()).file_name(name))
    }

    async fn upload(server: &TestServer, name: &str, content: &[u8]) -> FileResponse {
        let response = server.post("/upload").multipart(file_form(name, content)).await;
        response.assert_status_ok();
        response.json()
    }

    /// Path part of a returned link, e.g. `/file/ab12c/report.txt`.
    fn path_of(url: &str) -> &str {
        url.strip_prefix(PUBLIC_URL).unwrap()
    }

    #[tokio::test]
    async fn test_upload_download_delete_scenario() {
        let (_temp_dir, server) = create_test_app(test_config()).await;

        let uploaded = upload(&server, "report.txt", b"abc").await;
        assert_eq!(uploaded.name, "report.txt");

        let path = path_of(&uploaded.url);
        let segments: Vec<&str> = path.split('/').collect();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[1], "file");
        assert_eq!(segments[2].len(), 5);
        assert_eq!(segments[3], "report.txt");

        let response = server.get(path).await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"abc");
        assert_eq!(response.header("content-type"), "text/plain");

        let response = server.delete(path).await;
        response.assert_status_ok();
        response.assert_text("File deleted successfully");

        server.get(path).await.assert_status(StatusCode::NOT_FOUND);
        server.delete(path).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_special_characters_are_percent_encoded() {
        let (_temp_dir, server) = create_test_app(test_config()).await;

        let uploaded = upload(&server, "my report #1.pdf", b"%PDF-1.7").await;
        assert_eq!(uploaded.name, "my report #1.pdf");

        let path = path_of(&uploaded.url);
        assert!(path.ends_with("/my%20report%20%231.pdf"), "{}", path);

        let response = server.get(path).await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"%PDF-1.7");
        assert_eq!(response.header("content-type"), "application/pdf");
    }

    #[tokio::test]
    async fn test_list_files() {
        let (_temp_dir, server) = create_test_app(test_config()).await;

        let response = server.get("/files").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!([]));

        let names = ["a.txt", "b c.txt", "a.txt"];
        let mut uploaded = Vec::new();
        for name in names {
            uploaded.push(upload(&server, name, name.as_bytes()).await);
        }

        let listed: Vec<FileResponse> = server.get("/files").await.json();
        assert_eq!(listed.len(), names.len());
        for file in &uploaded {
            assert!(listed.contains(file), "missing {:?}", file);
        }
    }

    #[tokio::test]
    async fn test_unknown_files_are_not_found() {
        let (_temp_dir, server) = create_test_app(test_config()).await;
        upload(&server, "present.txt", b"here").await;

        let too_long = format!("/file/abcde/{}", "x".repeat(300));
        for path in [
            "/file/00000/present.txt",
            "/file/abcde/missing.txt",
            "/file/a_b/c.txt",
            too_long.as_str(),
        ] {
            let response = server.get(path).await;
            response.assert_status(StatusCode::NOT_FOUND);
            let body: Value = response.json();
            assert_eq!(body["error"], "File not found");

            server.delete(path).await.assert_status(StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_upload_without_file_field_is_bad_request() {
        let (_temp_dir, server) = create_test_app(test_config()).await;

        let form = MultipartForm::new().add_text("note", "no file here");
        let response = server.post("/upload").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let listed: Vec<FileResponse> = server.get("/files").await.json();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_overlong_upload_name_is_bad_request() {
        let (_temp_dir, server) = create_test_app(test_config()).await;

        let name = format!("{}.txt", "n".repeat(300));
        let response = server.post("/upload").multipart(file_form(&name, b"x")).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let listed: Vec<FileResponse> = server.get("/files").await.json();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_list_fails_when_storage_root_is_gone() {
        let (temp_dir, server) = create_test_app(test_config()).await;
        upload(&server, "a.txt", b"a").await;

        std::fs::remove_dir_all(temp_dir.path().join("uploads")).unwrap();

        let response = server.get("/files").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_reject_policy_returns_conflict() {
        let config = LocalConfig {
            duplicate_policy: DuplicatePolicy::Reject,
            ..test_config()
        };
        let (_temp_dir, server) = create_test_app(config).await;

        upload(&server, "photo.jpg", b"first").await;

        let response = server
            .post("/upload")
            .multipart(file_form("photo.jpg", b"second"))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "file photo.jpg already exists");

        let listed: Vec<FileResponse> = server.get("/files").await.json();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let config = LocalConfig {
            max_upload_size: 1024,
            ..test_config()
        };
        let (temp_dir, server) = create_test_app(config).await;

        let response = server
            .post("/upload")
            .multipart(file_form("big.bin", &vec![7u8; 64 * 1024]))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let leftovers = std::fs::read_dir(temp_dir.path().join("uploads"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_links_use_request_host_without_public_url() {
        let (_temp_dir, server) = create_test_app(LocalConfig::default()).await;

        let response = server
            .post("/upload")
            .add_header("host", "uploads.local:9000")
            .multipart(file_form("notes.md", b"# notes"))
            .await;
        response.assert_status_ok();

        let uploaded: FileResponse = response.json();
        assert!(
            uploaded.url.starts_with("http://uploads.local:9000/file/"),
            "{}",
            uploaded.url
        );
        assert!(uploaded.url.ends_with("/notes.md"));
    }

    #[tokio::test]
    async fn test_health_reports_file_count() {
        let (_temp_dir, server) = create_test_app(test_config()).await;
        upload(&server, "one.txt", b"1").await;

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["fileCount"], 1);
    }
}
