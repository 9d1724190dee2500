//! Cookie service: build and clear the httpOnly session cookie.

use axum::http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use time::Duration;

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};

/// Build the session cookie, living until `expires_at`.
pub fn session_cookie(
    config: &ApiConfig,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Cookie<'static> {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    Cookie::build((config.session_cookie_name.clone(), token.to_string()))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age))
        .build()
}

/// Build an expired session cookie to clear auth state.
pub fn clear_session_cookie(config: &ApiConfig) -> Cookie<'static> {
    Cookie::build((config.session_cookie_name.clone(), String::new()))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Whether `headers` already carry a `Set-Cookie` for `name`.
pub fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split_once('=').is_some_and(|(n, _)| n.trim() == name))
}

/// Append `cookie` as a `Set-Cookie` header.
pub fn append_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> AppResult<()> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AppError::Internal(format!("set-cookie header: {e}")))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}
