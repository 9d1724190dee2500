//! Authentication logic.
//!
//! Password hashing, opaque session tokens and the storage seam used by
//! `dariah_api` and `dariah_cli`.

pub mod memory;
pub mod password;
pub mod queries;
pub mod session;
pub mod store;

use thiserror::Error;

pub use memory::MemoryStore;
pub use queries::PgStore;
pub use store::{AuthStore, SessionStore, UserStore};

/// Authentication errors.
///
/// Token validation failures are not errors; they surface as `Ok(None)` from
/// [`session::validate_session_token`]. Only infrastructure failures and
/// credential checks end up here.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
