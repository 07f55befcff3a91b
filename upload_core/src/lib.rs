//! Core library for the blob upload service: validation, upload orchestration,
//! storage gateways and the HTTP surface over them.

pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;
pub mod models;

pub use config::{AppConfig, StorageBackend};
pub use error::{AppError, Result};
pub use files::{
    FileLibrary, LocalStorageGateway, MemoryStorageGateway, StorageGateway, UploadConstraints, UploadError,
    UploadRequest, UploadResult, Uploader, ValidationError,
};
pub use handlers::routes::create_routes;
pub use middleware::cors::cors_layer_from_config;

use axum::{extract::DefaultBodyLimit, Router};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::signal;
use tower_http::services::ServeDir;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub uploader: Arc<Uploader>,
    pub library: FileLibrary,
    pub blob_root: Option<PathBuf>,
}

impl Default for AppState {
    fn default() -> Self {
        let gateway: Arc<dyn StorageGateway> = Arc::new(MemoryStorageGateway::default());
        Self::new(Arc::new(Uploader::new(gateway)))
    }
}

impl AppState {
    pub fn new(uploader: Arc<Uploader>) -> Self {
        Self {
            app_name: "Blob Upload Service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            library: FileLibrary::new(uploader.clone()),
            uploader,
            blob_root: None,
        }
    }

    pub fn with_blob_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.blob_root = Some(root.into());
        self
    }

    /// Builds the gateway named by the config and an uploader carrying its limits.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let (gateway, blob_root): (Arc<dyn StorageGateway>, Option<PathBuf>) = match config.storage.backend {
            StorageBackend::Local => {
                let local =
                    LocalStorageGateway::new(&config.storage.root, &config.storage.public_base_url);
                local.initialize().await?;
                info!("Using local blob storage at {}", config.storage.root.display());

                let gateway: Arc<dyn StorageGateway> = Arc::new(local);
                (gateway, Some(config.storage.root.clone()))
            }
            StorageBackend::Memory => {
                info!("Using in-memory blob storage");
                let gateway: Arc<dyn StorageGateway> =
                    Arc::new(MemoryStorageGateway::new(&config.storage.public_base_url));
                (gateway, None)
            }
        };

        let uploader = Uploader::new(gateway)
            .with_constraints(config.uploads.constraints())
            .with_image_constraints(config.uploads.images.constraints())
            .with_document_constraints(config.uploads.documents.constraints())
            .with_progress_settings(config.progress.settings())
            .on_error(|err| tracing::warn!("Upload failed: {}", err));

        let mut state = Self::new(Arc::new(uploader));
        state.blob_root = blob_root;

        if let Err(e) = state.library.refresh(None).await {
            tracing::warn!("Initial file listing failed: {}", e);
        }

        Ok(state)
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, AppConfig::default())
}

pub fn create_app_with_config(state: AppState, config: AppConfig) -> Router {
    let mut router = Router::new().merge(create_routes());

    if let Some(root) = &state.blob_root {
        router = router.nest_service("/blobs", ServeDir::new(root));
    }

    router = router.layer(DefaultBodyLimit::max(config.server.max_body_bytes));

    router = router.layer(cors_layer_from_config(&config.cors));

    router = middleware::logging::trace_requests(router);

    router.with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
