use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod core;
mod middleware;
mod models;
#[cfg(test)]
mod tests;

use crate::core::{config::Settings, state::AppState};
use docinject::AgentContext;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new()?;

    info!(
        "Starting Documentation Injection Agent on {}:{}",
        settings.server.host, settings.server.port
    );

    let context = match AgentContext::connect(&settings.agent).await {
        Ok(context) => context,
        Err(e) => {
            error!("Failed to initialize clients: {}", e);
            return Err(e.into());
        },
    };
    info!("All clients initialized successfully");

    let state = AppState::new(context);
    let app = create_app(state.clone());

    let host: std::net::IpAddr = settings.server.host.parse()?;
    let addr = SocketAddr::from((host, settings.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    state.context.telemetry().flush().await;

    Ok(())
}

fn create_app(state: AppState) -> Router {
    use crate::middleware::{error_handler, request_id};
    use axum::middleware;

    let cors = CorsLayer::permissive();

    let api_routes = Router::new()
        .route("/v1/docs", post(api::docs::get_library_docs))
        .route("/v1/memory/search", post(api::memory::search_memory))
        .route(
            "/v1/memory/libraries/:library_name",
            get(api::memory::library_history),
        )
        .route("/v1/analytics", get(api::status::get_analytics))
        .route("/v1/feedback", post(api::status::log_feedback))
        .route("/status", get(api::status::get_status))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .layer(middleware::from_fn(error_handler::handle_errors))
        .layer(middleware::from_fn(request_id::add_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
