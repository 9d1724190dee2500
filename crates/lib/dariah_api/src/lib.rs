//! # dariah_api
//!
//! HTTP API library for the DARIAH reporting portal: session cookies,
//! per-client rate limiting and the sign-in/sign-out endpoints.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use dariah_core::auth::AuthStore;
use dariah_core::rate_limit::TokenBucket;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session and user persistence.
    pub store: Arc<dyn AuthStore>,
    /// Per-client-IP admission control.
    pub rate_limiter: Arc<TokenBucket>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Build state with a rate limiter sized from `config`.
    pub fn new(store: Arc<dyn AuthStore>, config: ApiConfig) -> Self {
        let rate_limiter = Arc::new(TokenBucket::new(
            config.rate_limit_capacity,
            config.rate_limit_interval(),
        ));
        Self {
            store,
            rate_limiter,
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `dariah_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    dariah_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
///
/// Layers, outermost first: tracing, rate limiting, session loading; protected
/// routes additionally pass `require_auth`.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_API_HEALTH, get(health::health))
        .route(routes::POST_AUTH_SIGN_IN, post(auth::sign_in_handler))
        .route(routes::POST_AUTH_SIGN_OUT, post(auth::sign_out_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::POST_AUTH_SIGN_OUT_ALL,
            post(auth::sign_out_all_handler),
        )
        .route_layer(axum::middleware::from_fn(middleware::auth::require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::load_session,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
