//! HTTP server for the story test generator
//!
//! Serves the Jira proxy API, the generation endpoint and the embedded UI.

mod auth;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;
mod static_files;

pub use error::ApiError;
pub use session::{Session, SessionLayer, SessionStore};
pub use state::ServerAppState;

use crate::config::ServerConfig;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Largest accepted JSON body
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Build the application router
///
/// Layer order: cors (outer) -> session -> body limit -> handler
pub fn build_router(state: ServerAppState, config: &ServerConfig) -> Router {
    // Credentialed CORS cannot use wildcards
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION])
        .allow_credentials(true);

    let api = Router::new()
        .route("/health", get(routes::health))
        .route("/generate-tests", post(routes::generate_routes::generate_tests))
        .nest("/jira", routes::jira_routes::router(config.debug_routes));

    Router::new()
        .nest("/api", api)
        .fallback(static_files::serve_static)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(SessionLayer::new(state.sessions.clone(), state.cookie_secure))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until shutdown is requested
pub async fn run_server(config: ServerConfig, state: ServerAppState) -> Result<(), String> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    if config.uses_dev_secret() {
        log::warn!("[session] SESSION_SECRET is not set; using the development secret");
    }

    SessionStore::start_cleanup_task(state.sessions.clone());
    let app = build_router(state.clone(), &config);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    log::info!("Server listening on http://{}", addr);
    log::info!("CORS origins: {}", config.allowed_origins().join(", "));
    if config.generation.api_key.is_none() {
        log::warn!("[generate] GENERATION_API_KEY is not set; /api/generate-tests will return 503");
    }
    if config.debug_routes {
        log::info!("[session] Debug route /api/jira/_store is enabled");
    }

    // Create shutdown signal that waits for the shutdown state flag
    let shutdown_state = state.shutdown_state.clone();
    let shutdown_signal = async move {
        loop {
            if shutdown_state.is_shutdown_requested() {
                log::info!("Shutdown signal received, stopping server...");
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| format!("Server error: {}", e))
}
