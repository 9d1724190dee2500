//! Health endpoint.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::models::HealthResponse;
use crate::services::auth::store_reachable;

/// `GET /api/health`: reports the crate version and store connectivity.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        version: dariah_core::version().to_string(),
        db_connected: store_reachable(state.store.as_ref()).await,
    })
}
