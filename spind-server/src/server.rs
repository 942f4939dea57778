//! Axum router setup.

use crate::auth::basic_auth_middleware;
use crate::config::ServerConfig;
use crate::handlers::vault;
use crate::rate_limit::RateLimiter;
use crate::storage::VaultStorage;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, patch};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn VaultStorage>,
    pub config: Arc<ServerConfig>,
    pub recovery_limiter: RateLimiter,
}

impl AppState {
    pub fn new(storage: Arc<dyn VaultStorage>, config: ServerConfig) -> Self {
        Self {
            storage,
            recovery_limiter: RateLimiter::new(config.recovery_rate_limit_per_minute),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_payload_size = state.config.max_payload_size;

    // Basic-auth routes
    let authenticated = Router::new()
        .route("/v1/vault", get(vault::get_vault).put(vault::put_vault))
        .route("/v1/vault/security", patch(vault::patch_security))
        .route("/v1/vault/recovery", get(vault::get_recovery))
        .layer(middleware::from_fn(basic_auth_middleware));

    // Unauthenticated routes
    let public = Router::new()
        .route("/v1/vault/security-questions", get(vault::security_questions))
        .route("/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(DefaultBodyLimit::max(max_payload_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_payload_size))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
