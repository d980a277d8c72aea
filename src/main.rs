mod adapters;
mod application;
mod domain;
mod services;

use adapters::{router::build_router, state::AppState};
use domain::config::local::LocalConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = LocalConfig::from_env().expect("ERROR: Invalid configuration");

    tracing::info!(
        "Starting file-drop with storage root {}",
        config.storage_root.display()
    );

    let storage_service = services::create_storage_service(&config)
        .await
        .expect("ERROR: Failed to prepare storage root. Check STORAGE_ROOT and its permissions.");

    let bind_address = config.bind_address();
    let router = build_router(AppState::new(config, storage_service));

    // Start the server
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .expect("Failed to bind to port");

    tracing::info!("Server listening on {}", bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
