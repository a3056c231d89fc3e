//! Pitwall Server
//!
//! Race control REST API and live event stream

use anyhow::Result;
use pitwall_server::{api, manager, settings::Settings, state::AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Pitwall Server");

    let settings = Settings::load()?;
    let addr = settings.addr()?;

    // Create application state
    let state = AppState::from_settings(settings)?;

    // Build the router
    let app = api::create_router(state.clone());

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    manager::shutdown(&state).await;
    info!("Server stopped");

    Ok(())
}
