use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use skeptic_bot::core::config::AppPaths;
use skeptic_bot::core::logging;
use skeptic_bot::server;
use skeptic_bot::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&AppPaths::new());
    let state = AppState::initialize()?;

    match state.config.load_config() {
        Ok(effective) => tracing::info!(
            "Effective config: {}",
            state.config.redact_sensitive_values(&effective)
        ),
        Err(err) => tracing::warn!("Failed to reload config for logging: {}", err),
    }

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        model = %state.settings.chat.model,
        window_policy = ?state.settings.chat.window_policy,
        "Listening on {}",
        addr
    );

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
