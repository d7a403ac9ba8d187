//! hr-server - HR administration backend

use std::time::Duration;

use hr_server::common::init_logger;
use hr_server::{AppState, Config, build_app};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    init_logger(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    tracing::info!("Starting hr-server (env: {})", config.environment);

    let (state, sessions) = AppState::connect(&config).await?;

    // Expired-session sweep
    sessions.spawn_gc(Duration::from_secs(config.session_gc_interval_secs.max(1)));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("hr-server HTTP listening on {}", config.http_addr);

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("hr-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
