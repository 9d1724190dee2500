//! Authentication service: sign-in/sign-out flows delegating to `dariah_core::auth`.

use dariah_core::auth::session::{self, create_session};
use dariah_core::auth::{AuthError, AuthStore, password};
use dariah_core::models::auth::{NewSession, User};
use tracing::info;

use crate::error::AppResult;
use crate::models::{SessionResponse, SignOutAllResponse, SignOutResponse};

/// A signed-in user and the session issued for them.
#[derive(Debug)]
pub struct SignedIn {
    pub user: User,
    pub session: NewSession,
}

impl SignedIn {
    pub fn response(&self) -> SessionResponse {
        SessionResponse {
            user: self.user.clone().into(),
            expires_at: self.session.session.expires_at,
        }
    }
}

/// Authenticate with email + password and open a new session.
///
/// Unknown email, missing password hash and wrong password all produce the
/// same error after the same amount of bcrypt work.
pub async fn sign_in<S>(store: &S, email: &str, password: &str) -> AppResult<SignedIn>
where
    S: AuthStore + ?Sized,
{
    let found = store.find_user_by_email(email).await?;

    // One bcrypt verification on every path, known email or not.
    let pw_hash = found.as_ref().and_then(|f| f.password_hash.as_deref());
    let verified = password::verify_password_or_dummy(password, pw_hash)?;

    let Some(found) = found.filter(|_| verified) else {
        return Err(AuthError::CredentialError.into());
    };

    let new_session = create_session(store, &found.user.id).await?;
    info!(user_id = %found.user.id, "user signed in");

    Ok(SignedIn {
        user: found.user,
        session: new_session,
    })
}

/// Sign out the current session, if any.
pub async fn sign_out<S>(store: &S, session_id: Option<&str>) -> AppResult<SignOutResponse>
where
    S: AuthStore + ?Sized,
{
    if let Some(id) = session_id {
        session::invalidate_session(store, id).await?;
    }
    Ok(SignOutResponse { success: true })
}

/// Sign out every session of a user.
pub async fn sign_out_all<S>(store: &S, user_id: &str) -> AppResult<SignOutAllResponse>
where
    S: AuthStore + ?Sized,
{
    let revoked = session::invalidate_user_sessions(store, user_id).await?;
    Ok(SignOutAllResponse { revoked })
}

/// Report whether the backing store answers.
pub async fn store_reachable<S>(store: &S) -> bool
where
    S: AuthStore + ?Sized,
{
    match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("store ping failed: {e}");
            false
        }
    }
}
