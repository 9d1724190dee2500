//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthContext;
use crate::models::{SessionResponse, SignInRequest, SignOutAllResponse, SignOutResponse};
use crate::services::{auth, cookies};

/// `POST /auth/sign-in`: authenticate with email + password, set the session cookie.
pub async fn sign_in_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SignInRequest>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let signed_in = auth::sign_in(state.store.as_ref(), &body.email, &body.password).await?;
    let cookie = cookies::session_cookie(
        &state.config,
        &signed_in.session.token,
        signed_in.session.session.expires_at,
    );
    Ok((jar.add(cookie), Json(signed_in.response())))
}

/// `POST /auth/sign-out`: end the current session (if any) and clear the cookie.
pub async fn sign_out_handler(
    State(state): State<AppState>,
    ctx: Option<Extension<AuthContext>>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<SignOutResponse>)> {
    let session_id = ctx.as_ref().map(|Extension(c)| c.session.id.as_str());
    let resp = auth::sign_out(state.store.as_ref(), session_id).await?;
    Ok((jar.add(cookies::clear_session_cookie(&state.config)), Json(resp)))
}

/// `POST /auth/sign-out-all`: end every session of the current user. Requires authentication.
pub async fn sign_out_all_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<SignOutAllResponse>)> {
    let resp = auth::sign_out_all(state.store.as_ref(), &ctx.user.id).await?;
    Ok((jar.add(cookies::clear_session_cookie(&state.config)), Json(resp)))
}

/// `GET /auth/me`: the signed-in user. Requires authentication.
pub async fn me_handler(Extension(ctx): Extension<AuthContext>) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: ctx.user.into(),
        expires_at: ctx.session.expires_at,
    })
}
