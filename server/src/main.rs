use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use server::{AppState, DEFAULT_LOG_FILTER, build_router, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env();
    if config.uses_default_api_key() {
        tracing::warn!("API_KEY not set, using the insecure development key");
    }

    let bind_address = config.bind_address();
    let state = AppState::new(config);

    state.store.init().await.with_context(|| {
        format!(
            "Failed to create upload directory {}",
            state.store.base_dir().display()
        )
    })?;

    tracing::info!("Starting Skincare Analysis API");
    tracing::info!(
        "Upload directory ready: {} (max file size {} bytes)",
        state.store.base_dir().display(),
        state.config.max_file_size
    );

    let app = build_router(state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down Skincare Analysis API");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
