//! Integration tests: build the router over an in-memory store and drive the
//! session cookie through sign-in, use, renewal, expiry and sign-out.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use chrono::{DateTime, Duration, Utc};
use dariah_api::{AppState, config::ApiConfig};
use dariah_core::auth::session::{SessionToken, create_session, create_session_at};
use dariah_core::auth::{AuthError, MemoryStore, SessionStore, UserStore, password};
use dariah_core::models::auth::{Session, User, UserWithPassword};
use tower::ServiceExt;

const EMAIL: &str = "reporter@dariah.eu";
const PASSWORD: &str = "national-coordinator";

async fn setup() -> (Router, Arc<MemoryStore>, User) {
    let store = Arc::new(MemoryStore::new());
    let hash = password::hash_password(PASSWORD).expect("hash");
    let user = store
        .create_user(EMAIL, Some("Reporter"), &hash)
        .await
        .expect("create user");
    let state = AppState::new(store.clone(), ApiConfig::default());
    (dariah_api::router(state), store, user)
}

fn sign_in_request(email: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/sign-in")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "email": email, "password": password }).to_string(),
        ))
        .unwrap()
}

fn with_cookie(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(COOKIE, format!("dariah_session={token}"))
        .body(Body::empty())
        .unwrap()
}

/// The `dariah_session` Set-Cookie header, if the response carries one.
fn session_set_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("dariah_session="))
        .map(str::to_string)
}

fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|kv| kv.split_once('='))
        .map(|(_, v)| v.to_string())
        .unwrap_or_default()
}

fn max_age(set_cookie: &str) -> Option<i64> {
    set_cookie
        .split(';')
        .map(str::trim)
        .find_map(|attr| attr.strip_prefix("Max-Age="))
        .and_then(|v| v.parse().ok())
}

async fn json_body(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

#[tokio::test]
async fn sign_in_sets_cookie_and_me_returns_user() {
    let (app, store, user) = setup().await;

    let resp = app
        .clone()
        .oneshot(sign_in_request(EMAIL, PASSWORD))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = session_set_cookie(&resp).expect("session cookie");
    assert!(set_cookie.contains("HttpOnly"));
    let token = cookie_value(&set_cookie);
    assert!(SessionToken::parse(&token).is_some(), "malformed token: {token}");

    let json = json_body(resp).await;
    assert_eq!(json["user"]["email"], EMAIL);
    assert!(json["expiresAt"].is_string());
    assert_eq!(store.session_count(), 1);

    let resp = app
        .oneshot(with_cookie("GET", "/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // A fresh session is not renewed, so no cookie is re-issued.
    assert!(session_set_cookie(&resp).is_none());
    let json = json_body(resp).await;
    assert_eq!(json["user"]["id"], user.id.as_str());
    assert_eq!(json["user"]["name"], "Reporter");
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let (app, store, _) = setup().await;

    let wrong_password = app
        .clone()
        .oneshot(sign_in_request(EMAIL, "not-the-password"))
        .await
        .unwrap();
    let unknown_email = app
        .oneshot(sign_in_request("nobody@dariah.eu", PASSWORD))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(wrong_password).await, json_body(unknown_email).await);
    assert_eq!(store.session_count(), 0);
}

#[tokio::test]
async fn unknown_email_pays_for_bcrypt() {
    let (app, _, _) = setup().await;

    // The first unknown-email attempt also builds the stand-in hash.
    app.clone()
        .oneshot(sign_in_request("warmup@dariah.eu", PASSWORD))
        .await
        .unwrap();

    let start = std::time::Instant::now();
    let resp = app
        .clone()
        .oneshot(sign_in_request(EMAIL, "not-the-password"))
        .await
        .unwrap();
    let wrong_password = start.elapsed();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let start = std::time::Instant::now();
    let resp = app
        .oneshot(sign_in_request("nobody@dariah.eu", PASSWORD))
        .await
        .unwrap();
    let unknown_email = start.elapsed();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert!(
        unknown_email * 4 > wrong_password,
        "unknown email took {unknown_email:?}, wrong password {wrong_password:?}"
    );
}

#[tokio::test]
async fn me_without_cookie_is_unauthorized() {
    let (app, _, _) = setup().await;
    let req = Request::builder()
        .uri("/auth/me")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "unauthorized");
}

#[tokio::test]
async fn tampered_cookie_is_rejected_and_cleared() {
    let (app, store, user) = setup().await;
    let new = create_session(store.as_ref(), &user.id).await.unwrap();
    let mut tampered = SessionToken::parse(&new.token).unwrap();
    tampered.secret = SessionToken::generate().secret;

    let resp = app
        .oneshot(with_cookie("GET", "/auth/me", &tampered.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let set_cookie = session_set_cookie(&resp).expect("clearing cookie");
    assert_eq!(cookie_value(&set_cookie), "");
    assert_eq!(max_age(&set_cookie), Some(0));
    // The real session is untouched.
    assert_eq!(store.session_count(), 1);
}

#[tokio::test]
async fn session_in_renewal_window_reissues_cookie() {
    let (app, store, user) = setup().await;
    let new = create_session_at(store.as_ref(), &user.id, Utc::now() - Duration::days(20))
        .await
        .unwrap();

    let resp = app
        .oneshot(with_cookie("GET", "/auth/me", &new.token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = session_set_cookie(&resp).expect("renewed cookie");
    assert_eq!(cookie_value(&set_cookie), new.token);
    let age = max_age(&set_cookie).expect("max-age");
    assert!(age > Duration::days(29).num_seconds(), "max-age {age}");

    let (stored, _) = store.find_session(&new.session.id).await.unwrap().unwrap();
    assert!(stored.expires_at > new.session.expires_at);
}

#[tokio::test]
async fn expired_session_is_deleted_and_cleared() {
    let (app, store, user) = setup().await;
    let new = create_session_at(store.as_ref(), &user.id, Utc::now() - Duration::days(31))
        .await
        .unwrap();

    let resp = app
        .oneshot(with_cookie("GET", "/auth/me", &new.token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(max_age(&session_set_cookie(&resp).unwrap()), Some(0));
    assert_eq!(store.session_count(), 0);
}

#[tokio::test]
async fn sign_out_ends_session() {
    let (app, store, user) = setup().await;
    let new = create_session(store.as_ref(), &user.id).await.unwrap();

    let resp = app
        .clone()
        .oneshot(with_cookie("POST", "/auth/sign-out", &new.token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(max_age(&session_set_cookie(&resp).unwrap()), Some(0));
    assert_eq!(json_body(resp).await["success"], true);
    assert_eq!(store.session_count(), 0);

    let resp = app
        .oneshot(with_cookie("GET", "/auth/me", &new.token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_out_without_session_succeeds() {
    let (app, _, _) = setup().await;
    let req = Request::builder()
        .method("POST")
        .uri("/auth/sign-out")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn sign_out_all_revokes_every_session() {
    let (app, store, user) = setup().await;
    let a = create_session(store.as_ref(), &user.id).await.unwrap();
    let b = create_session(store.as_ref(), &user.id).await.unwrap();

    let resp = app
        .clone()
        .oneshot(with_cookie("POST", "/auth/sign-out-all", &a.token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["revoked"], 2);

    let resp = app
        .oneshot(with_cookie("GET", "/auth/me", &b.token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_in_with_stale_cookie_keeps_new_cookie() {
    let (app, _, _) = setup().await;
    let stale = SessionToken::generate().to_string();
    let mut req = sign_in_request(EMAIL, PASSWORD);
    req.headers_mut()
        .insert(COOKIE, format!("dariah_session={stale}").parse().unwrap());

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies: Vec<_> = resp
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with("dariah_session="))
        .collect();
    assert_eq!(cookies.len(), 1);
    assert_ne!(cookie_value(cookies[0]), "");
}

#[tokio::test]
async fn health_reports_version() {
    let (app, _, _) = setup().await;
    let req = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["version"], dariah_core::version());
    assert_eq!(json["dbConnected"], true);
}

/// Store whose every call fails as if the database pool were exhausted.
struct UnavailableStore;

fn unavailable() -> AuthError {
    AuthError::DbError(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl SessionStore for UnavailableStore {
    async fn find_session(&self, _: &str) -> Result<Option<(Session, User)>, AuthError> {
        Err(unavailable())
    }
    async fn insert_session(&self, _: &Session) -> Result<(), AuthError> {
        Err(unavailable())
    }
    async fn update_session_expiry(&self, _: &str, _: DateTime<Utc>) -> Result<(), AuthError> {
        Err(unavailable())
    }
    async fn delete_session(&self, _: &str) -> Result<(), AuthError> {
        Err(unavailable())
    }
    async fn delete_user_sessions(&self, _: &str) -> Result<u64, AuthError> {
        Err(unavailable())
    }
    async fn delete_expired_sessions(&self, _: DateTime<Utc>) -> Result<u64, AuthError> {
        Err(unavailable())
    }
    async fn ping(&self) -> Result<(), AuthError> {
        Err(unavailable())
    }
}

#[async_trait]
impl UserStore for UnavailableStore {
    async fn find_user_by_email(&self, _: &str) -> Result<Option<UserWithPassword>, AuthError> {
        Err(unavailable())
    }
    async fn find_user_by_id(&self, _: &str) -> Result<Option<User>, AuthError> {
        Err(unavailable())
    }
    async fn create_user(
        &self,
        _: &str,
        _: Option<&str>,
        _: &str,
    ) -> Result<User, AuthError> {
        Err(unavailable())
    }
}

#[tokio::test]
async fn store_outage_is_not_reported_as_unauthenticated() {
    let app = dariah_api::router(AppState::new(
        Arc::new(UnavailableStore),
        ApiConfig::default(),
    ));
    let token = SessionToken::generate().to_string();

    let resp = app
        .clone()
        .oneshot(with_cookie("GET", "/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["error"], "db_unavailable");

    let req = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(json_body(resp).await["dbConnected"], false);
}
