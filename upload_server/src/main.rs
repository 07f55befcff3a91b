//! Blob upload server

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upload_core::{create_app_with_config, run_server, AppConfig, AppState, StorageBackend};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config
        .create_directories()
        .context("Failed to create storage directories")?;

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    match config.storage.backend {
        StorageBackend::Local => info!(
            root = %config.storage.root.display(),
            public_base_url = %config.storage.public_base_url,
            "Blobs stored on local disk"
        ),
        StorageBackend::Memory => info!("Blobs held in memory, nothing survives a restart"),
    }

    let state = AppState::from_config(&config)
        .await
        .context("Failed to initialize storage gateway")?;

    info!(
        max_bytes = config.uploads.max_size_bytes,
        allowed = ?config.uploads.allowed_mime_types,
        folder = ?config.uploads.destination_folder,
        "{} v{} accepting uploads",
        state.app_name,
        state.version
    );

    let app = create_app_with_config(state, config);
    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "upload_server={level},upload_core={level},tower_http=debug",
            level = default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);
    let registry = tracing_subscriber::registry().with(env_filter);

    match std::env::var("LOG_FORMAT").unwrap_or_default().to_lowercase().as_str() {
        "json" => registry.with(fmt_layer.json()).init(),
        "compact" => registry.with(fmt_layer.compact()).init(),
        _ => registry.with(fmt_layer.pretty()).init(),
    }
}
