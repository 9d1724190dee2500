//! Per-client-IP admission control.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Key used when the client IP header is absent.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Token cost of a request that cannot change state.
const SAFE_METHOD_COST: u32 = 1;
/// Token cost of everything else.
const UNSAFE_METHOD_COST: u32 = 3;

/// Client identifier: first entry of the configured IP header.
pub fn client_ip(headers: &HeaderMap, header_name: &str) -> String {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Tokens charged for a request with this method.
pub fn request_cost(method: &Method) -> u32 {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        SAFE_METHOD_COST
    } else {
        UNSAFE_METHOD_COST
    }
}

/// Axum middleware: charges the client's bucket and rejects with 429 when empty.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_ip(request.headers(), &state.config.client_ip_header);
    let cost = request_cost(request.method());

    if !state.rate_limiter.consume(&client, cost) {
        warn!(client = %client, cost, path = %request.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(request).await)
}
