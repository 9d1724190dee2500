//! PostgreSQL-backed session and user store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::store::{SessionStore, UserStore};
use crate::models::auth::{Session, User, UserWithPassword};

/// [`SessionStore`] + [`UserStore`] over the `sessions` and `users` tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn find_session(&self, session_id: &str) -> Result<Option<(Session, User)>, AuthError> {
        let row = sqlx::query_as::<
            _,
            (
                String,
                Vec<u8>,
                String,
                DateTime<Utc>,
                String,
                Option<String>,
            ),
        >(
            "SELECT s.id, s.secret_hash, s.user_id::text, s.expires_at, u.email, u.name \
             FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, secret_hash, user_id, expires_at, email, name)| {
            let user = User {
                id: user_id.clone(),
                email,
                name,
            };
            let session = Session {
                id,
                secret_hash,
                user_id,
                expires_at,
            };
            (session, user)
        }))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO sessions (id, secret_hash, user_id, expires_at) \
             VALUES ($1, $2, $3::uuid, $4)",
        )
        .bind(&session.id)
        .bind(&session.secret_hash)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query("UPDATE sessions SET expires_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1::uuid")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let row = sqlx::query_as::<_, (String, Option<String>, Option<String>)>(
            "SELECT id::text, name, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, password_hash)| UserWithPassword {
            user: User {
                id,
                email: email.to_string(),
                name,
            },
            password_hash,
        }))
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT email, name FROM users WHERE id = $1::uuid",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(email, name)| User {
            id: user_id.to_string(),
            email,
            name,
        }))
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            return Err(AuthError::ValidationError("Email already registered".into()));
        }

        let id = sqlx::query_scalar::<_, String>(
            "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING id::text",
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(User {
            id,
            email: email.to_string(),
            name: name.map(str::to_string),
        })
    }
}
