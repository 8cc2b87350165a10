use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{AppState, config::AppConfig, routes};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting video insights API");

    let config = AppConfig::from_env()?;
    let app_state = AppState::from_config(&config).await?;

    // Start the web server
    let app = routes::create_router(app_state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("API service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
