//! Opaque session tokens.
//!
//! A token is `<id>.<secret>`: both segments are 24 random alphanumeric
//! characters. The id is the lookup key; only the SHA-256 digest of the
//! secret is persisted. Sessions live for 30 days and slide forward by a full
//! lifetime when used during the second half of it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AuthError;
use super::store::SessionStore;
use crate::models::auth::{NewSession, Session, ValidatedSession};

/// Total session lifetime: 30 days.
pub const SESSION_LIFETIME_DAYS: i64 = 30;

/// Length of each token segment.
const SEGMENT_LEN: usize = 24;

const SEPARATOR: char = '.';

/// Compared against when there is no stored digest, so unknown ids cost the
/// same work as a secret mismatch.
const DUMMY_DIGEST: [u8; 32] = [0u8; 32];

/// Total session lifetime as a duration.
pub fn session_lifetime() -> Duration {
    Duration::days(SESSION_LIFETIME_DAYS)
}

/// A parsed `<id>.<secret>` token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub id: String,
    pub secret: String,
}

impl SessionToken {
    /// Generate a fresh random id/secret pair.
    pub fn generate() -> Self {
        Self {
            id: random_segment(),
            secret: random_segment(),
        }
    }

    /// Parse a token, returning `None` unless both segments are well formed.
    pub fn parse(token: &str) -> Option<Self> {
        let (id, secret) = token.split_once(SEPARATOR)?;
        if !is_segment(id) || !is_segment(secret) {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.id, self.secret)
    }
}

// Keeps secrets out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn random_segment() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SEGMENT_LEN)
        .map(char::from)
        .collect()
}

fn is_segment(s: &str) -> bool {
    s.len() == SEGMENT_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// SHA-256 digest of a token secret, as stored.
pub fn hash_secret(secret: &str) -> Vec<u8> {
    Sha256::digest(secret.as_bytes()).to_vec()
}

/// Compare two byte strings without early exit on the first difference.
///
/// Lengths are not secret (digests are fixed size), so a length mismatch
/// returns immediately.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    #[cfg(test)]
    tests::DIGEST_COMPARES.with(|n| n.set(n.get() + 1));

    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    std::hint::black_box(diff) == 0
}

/// Create and persist a new session for `user_id`.
pub async fn create_session<S>(store: &S, user_id: &str) -> Result<NewSession, AuthError>
where
    S: SessionStore + ?Sized,
{
    create_session_at(store, user_id, Utc::now()).await
}

/// [`create_session`] with an explicit clock.
pub async fn create_session_at<S>(
    store: &S,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<NewSession, AuthError>
where
    S: SessionStore + ?Sized,
{
    let token = SessionToken::generate();
    let session = Session {
        id: token.id.clone(),
        secret_hash: hash_secret(&token.secret),
        user_id: user_id.to_string(),
        expires_at: now + session_lifetime(),
    };
    store.insert_session(&session).await?;
    debug!(session_id = %session.id, user_id, "session created");
    Ok(NewSession {
        token: token.to_string(),
        session,
    })
}

/// Validate an untrusted session token.
///
/// Returns `Ok(None)` for every kind of rejection (malformed, unknown id,
/// wrong secret, expired). Store failures are returned as errors.
pub async fn validate_session_token<S>(
    store: &S,
    token: &str,
) -> Result<Option<ValidatedSession>, AuthError>
where
    S: SessionStore + ?Sized,
{
    validate_session_token_at(store, token, Utc::now()).await
}

/// [`validate_session_token`] with an explicit clock.
pub async fn validate_session_token_at<S>(
    store: &S,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<ValidatedSession>, AuthError>
where
    S: SessionStore + ?Sized,
{
    let parsed = SessionToken::parse(token);
    let found = match &parsed {
        Some(t) => store.find_session(&t.id).await?,
        None => None,
    };

    // Always hash and compare, whatever happened above.
    let provided = hash_secret(parsed.as_ref().map_or(token, |t| t.secret.as_str()));
    let stored = found
        .as_ref()
        .map_or(&DUMMY_DIGEST[..], |(s, _)| s.secret_hash.as_slice());
    let secret_matches = constant_time_eq(&provided, stored);

    let Some((mut session, user)) = found else {
        return Ok(None);
    };
    if !secret_matches {
        return Ok(None);
    }

    if now >= session.expires_at {
        store.delete_session(&session.id).await?;
        debug!(session_id = %session.id, "expired session deleted");
        return Ok(None);
    }

    let lifetime = session_lifetime();
    let renewed = session.expires_at - now < lifetime / 2;
    if renewed {
        session.expires_at = now + lifetime;
        store
            .update_session_expiry(&session.id, session.expires_at)
            .await?;
        debug!(session_id = %session.id, expires_at = %session.expires_at, "session renewed");
    }

    Ok(Some(ValidatedSession {
        session,
        user,
        renewed,
    }))
}

/// Delete a single session (sign-out).
pub async fn invalidate_session<S>(store: &S, session_id: &str) -> Result<(), AuthError>
where
    S: SessionStore + ?Sized,
{
    store.delete_session(session_id).await
}

/// Delete every session of a user (sign-out everywhere).
pub async fn invalidate_user_sessions<S>(store: &S, user_id: &str) -> Result<u64, AuthError>
where
    S: SessionStore + ?Sized,
{
    let removed = store.delete_user_sessions(user_id).await?;
    info!(user_id, removed, "user sessions invalidated");
    Ok(removed)
}

/// Delete all sessions that have expired as of now.
pub async fn sweep_expired_sessions<S>(store: &S) -> Result<u64, AuthError>
where
    S: SessionStore + ?Sized,
{
    store.delete_expired_sessions(Utc::now()).await
}

/// Spawn a task that sweeps expired sessions every `every` until `cancel` fires.
pub fn spawn_sweep_task<S>(
    store: Arc<S>,
    every: StdDuration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    S: SessionStore + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match sweep_expired_sessions(store.as_ref()).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "expired sessions swept"),
                        Err(e) => warn!("session sweep failed: {e}"),
                    }
                }
            }
        }
    })
}
