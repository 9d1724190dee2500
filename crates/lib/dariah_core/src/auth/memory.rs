//! In-memory session and user store.
//!
//! Used by tests and for running the API without PostgreSQL. Nothing is
//! persisted across restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::AuthError;
use super::store::{SessionStore, UserStore};
use crate::models::auth::{Session, User, UserWithPassword};

/// [`SessionStore`] + [`UserStore`] backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    /// Keyed by user id.
    users: DashMap<String, UserWithPassword>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session(&self, session_id: &str) -> Result<Option<(Session, User)>, AuthError> {
        let Some(session) = self.sessions.get(session_id).map(|s| s.clone()) else {
            return Ok(None);
        };
        let user = self.users.get(&session.user_id).map(|u| u.user.clone());
        Ok(user.map(|user| (session, user)))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> Result<u64, AuthError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.user.email == email)
            .map(|u| u.value().clone()))
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(user_id).map(|u| u.user.clone()))
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        if self.users.iter().any(|u| u.user.email == email) {
            return Err(AuthError::ValidationError("Email already registered".into()));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.map(str::to_string),
        };
        self.users.insert(
            user.id.clone(),
            UserWithPassword {
                user: user.clone(),
                password_hash: Some(password_hash.to_string()),
            },
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn session(id: &str, user_id: &str, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: id.into(),
            secret_hash: vec![0; 32],
            user_id: user_id.into(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store.create_user("a@example.org", None, "h").await.unwrap();
        let err = store.create_user("a@example.org", None, "h").await.unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)));
    }

    #[tokio::test]
    async fn find_user_by_email_and_id() {
        let store = MemoryStore::new();
        let user = store
            .create_user("b@example.org", Some("Bea"), "hash")
            .await
            .unwrap();

        let found = store.find_user_by_email("b@example.org").await.unwrap().unwrap();
        assert_eq!(found.user, user);
        assert_eq!(found.password_hash.as_deref(), Some("hash"));
        assert_eq!(store.find_user_by_id(&user.id).await.unwrap(), Some(user));
        assert!(store.find_user_by_email("nobody@example.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_without_user_is_not_found() {
        let store = MemoryStore::new();
        store
            .insert_session(&session("s1", "ghost", Utc::now()))
            .await
            .unwrap();
        assert!(store.find_session("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_expired_keeps_live_sessions() {
        let store = MemoryStore::new();
        let user = store.create_user("c@example.org", None, "h").await.unwrap();
        let now = Utc::now();
        store
            .insert_session(&session("old", &user.id, now - Duration::seconds(1)))
            .await
            .unwrap();
        store
            .insert_session(&session("edge", &user.id, now))
            .await
            .unwrap();
        store
            .insert_session(&session("live", &user.id, now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 2);
        assert_eq!(store.session_count(), 1);
        assert!(store.find_session("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_expiry_of_unknown_session_is_noop() {
        let store = MemoryStore::new();
        store
            .update_session_expiry("missing", Utc::now())
            .await
            .unwrap();
        assert_eq!(store.session_count(), 0);
    }
}
