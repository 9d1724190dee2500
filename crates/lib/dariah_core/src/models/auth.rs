//! Authentication domain models.
//!
//! These are internal domain models, distinct from the HTTP response models
//! in `dariah_api` (which are camelCase and never carry digests).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: Option<String>,
}

/// Session record stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// SHA-256 digest of the token secret.
    #[serde(skip)]
    pub secret_hash: Vec<u8>,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a successful token validation.
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub session: Session,
    pub user: User,
    /// Whether `expires_at` was pushed forward by this validation.
    pub renewed: bool,
}

/// A freshly created session together with the bearer token handed to the client.
///
/// The token is only available here; the store keeps the digest.
#[derive(Clone)]
pub struct NewSession {
    pub token: String,
    pub session: Session,
}

impl fmt::Debug for NewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSession")
            .field("token", &"<redacted>")
            .field("session", &self.session)
            .finish()
    }
}
