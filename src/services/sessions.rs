//! Login sessions keyed by opaque tokens, with a sliding expiry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::RedisError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::core::config::MAX_SESSION_TTL_SECONDS;
use crate::core::redis::RedisHandle;
use crate::core::security;

const REDIS_KEY_PREFIX: &str = "session:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Session {
    pub(crate) username: String,
    /// Unix timestamp in seconds.
    pub(crate) expires_at: i64,
}

impl Session {
    fn expiring_in(username: String, ttl: Duration) -> Self {
        Self { username, expires_at: (OffsetDateTime::now_utc() + ttl).unix_timestamp() }
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc().unix_timestamp()
    }
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("session cache error: {0}")]
    Redis(#[from] RedisError),
    #[error("session encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[async_trait]
pub(crate) trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> Result<Option<Session>, SessionError>;

    async fn put(&self, token: &str, session: &Session) -> Result<(), SessionError>;

    async fn remove(&self, token: &str) -> Result<(), SessionError>;
}

#[derive(Default)]
pub(crate) struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &str) -> Result<Option<Session>, SessionError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(session) if session.is_expired() => {
                sessions.remove(token);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, token: &str, session: &Session) -> Result<(), SessionError> {
        self.sessions.lock().await.insert(token.to_string(), session.clone());
        Ok(())
    }

    async fn remove(&self, token: &str) -> Result<(), SessionError> {
        self.sessions.lock().await.remove(token);
        Ok(())
    }
}

pub(crate) struct RedisSessionStore {
    redis: RedisHandle,
}

impl RedisSessionStore {
    pub(crate) fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }

    fn key(token: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{token}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, token: &str) -> Result<Option<Session>, SessionError> {
        let Some(raw) = self.redis.get(&Self::key(token)).await? else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&raw)?;
        Ok(if session.is_expired() { None } else { Some(session) })
    }

    async fn put(&self, token: &str, session: &Session) -> Result<(), SessionError> {
        let remaining = session.expires_at - OffsetDateTime::now_utc().unix_timestamp();
        let ttl = u64::try_from(remaining).unwrap_or(0).max(1);
        let raw = serde_json::to_string(session)?;
        self.redis.set_ex(&Self::key(token), &raw, ttl).await?;
        Ok(())
    }

    async fn remove(&self, token: &str) -> Result<(), SessionError> {
        self.redis.delete(&Self::key(token)).await?;
        Ok(())
    }
}

/// Issues, validates and revokes sessions on top of a [`SessionStore`].
#[derive(Clone)]
pub(crate) struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionManager {
    /// `ttl_seconds` is clamped to [`MAX_SESSION_TTL_SECONDS`].
    pub(crate) fn new(store: Arc<dyn SessionStore>, ttl_seconds: u64) -> Self {
        let seconds = ttl_seconds.min(MAX_SESSION_TTL_SECONDS);
        let ttl = Duration::seconds(i64::try_from(seconds).unwrap_or_default());
        Self { store, ttl }
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) async fn open(&self, username: &str) -> Result<(String, Session), SessionError> {
        let token = security::new_session_token();
        let session = Session::expiring_in(username.to_string(), self.ttl);
        self.store.put(&token, &session).await?;
        tracing::debug!(username, "session opened");
        Ok((token, session))
    }

    /// Returns the live session for `token`, pushing its expiry one TTL into the future.
    /// Expired sessions are deleted and reported as absent.
    pub(crate) async fn validate(&self, token: &str) -> Result<Option<Session>, SessionError> {
        let Some(session) = self.store.get(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.store.remove(token).await?;
            return Ok(None);
        }

        let renewed = Session::expiring_in(session.username, self.ttl);
        self.store.put(token, &renewed).await?;
        Ok(Some(renewed))
    }

    pub(crate) async fn close(&self, token: &str) -> Result<(), SessionError> {
        self.store.remove(token).await
    }
}
