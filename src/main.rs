use habitflow::coach::{CoachClient, GeminiClient};
use habitflow::{router, AppState, Config, JsonFileStorage, Storage};
use std::{net::SocketAddr, sync::Arc};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    if let Some(parent) = config.data_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let storage = Arc::new(JsonFileStorage::new(config.data_path.clone()));
    let data = storage.load().await;
    info!(
        path = %storage.path().display(),
        users = data.users.len(),
        habits = data.habits.len(),
        "data loaded"
    );

    let coach: Option<Arc<dyn CoachClient>> = match config.api_key.clone() {
        Some(api_key) => Some(Arc::new(GeminiClient::new(
            api_key,
            config.coach_model.clone(),
            config.coach_base_url.clone(),
        ))),
        None => {
            warn!("no API key configured, coaching endpoints are disabled");
            None
        }
    };

    let app = router(AppState::new(storage, data, coach));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
    }
    info!("shutting down");
}
