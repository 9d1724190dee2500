//! Storage seam for sessions and users.
//!
//! The session validator only needs [`SessionStore`]; sign-in additionally
//! needs [`UserStore`]. [`AuthStore`] is the combination handed around as a
//! trait object by the HTTP layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{Session, User, UserWithPassword};

/// Persistence for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session and its owning user by session id.
    async fn find_session(&self, session_id: &str) -> Result<Option<(Session, User)>, AuthError>;

    /// Persist a new session record.
    async fn insert_session(&self, session: &Session) -> Result<(), AuthError>;

    /// Move the expiry of an existing session. Last writer wins.
    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Delete one session. Deleting an unknown id is not an error.
    async fn delete_session(&self, session_id: &str) -> Result<(), AuthError>;

    /// Delete every session owned by a user, returning how many were removed.
    async fn delete_user_sessions(&self, user_id: &str) -> Result<u64, AuthError>;

    /// Delete every session with `expires_at <= now`, returning how many were removed.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Persistence for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user (with password hash) by email.
    async fn find_user_by_email(&self, email: &str)
    -> Result<Option<UserWithPassword>, AuthError>;

    /// Fetch a user by id.
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;

    /// Create a user. Fails with `ValidationError` if the email is taken.
    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<User, AuthError>;
}

/// Everything the HTTP layer needs from storage.
pub trait AuthStore: SessionStore + UserStore {}

impl<T: SessionStore + UserStore> AuthStore for T {}
