//! Session middleware: cookie extraction, token validation and the auth guard.
//!
//! `load_session` validates the session cookie once per request and passes the
//! result down as an [`AuthContext`] request extension. Handlers and
//! `require_auth` read that extension instead of validating again.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use dariah_core::auth::session::validate_session_token;
use dariah_core::models::auth::{Session, User};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies;

/// The validated session of the current request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session: Session,
    pub user: User,
}

/// Axum middleware: validates the session cookie, if present.
///
/// On success inserts [`AuthContext`] and, when the session was renewed,
/// re-issues the cookie with the new lifetime. An invalid cookie is cleared.
/// Neither happens when the handler already set the session cookie itself
/// (sign-in, sign-out). Store failures abort the request.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_name = state.config.session_cookie_name.as_str();
    let Some(token) = jar.get(cookie_name).map(|c| c.value().to_string()) else {
        return Ok(next.run(request).await);
    };

    let validated = validate_session_token(state.store.as_ref(), &token).await?;

    let refresh = match validated {
        Some(v) => {
            let refresh = v
                .renewed
                .then(|| cookies::session_cookie(&state.config, &token, v.session.expires_at));
            request.extensions_mut().insert(AuthContext {
                session: v.session,
                user: v.user,
            });
            refresh
        }
        None => {
            debug!("discarding invalid session cookie");
            Some(cookies::clear_session_cookie(&state.config))
        }
    };

    let mut response = next.run(request).await;
    if let Some(cookie) = refresh
        && !cookies::sets_cookie(response.headers(), cookie_name)
    {
        cookies::append_cookie(response.headers_mut(), &cookie)?;
    }
    Ok(response)
}

/// Axum middleware: rejects requests without an [`AuthContext`].
///
/// Must run inside [`load_session`].
pub async fn require_auth(request: Request, next: Next) -> Result<Response, AppError> {
    if request.extensions().get::<AuthContext>().is_none() {
        return Err(AppError::Unauthorized("Not signed in".into()));
    }
    Ok(next.run(request).await)
}
