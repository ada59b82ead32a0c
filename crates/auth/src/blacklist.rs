use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

/// The revocation store could not be read or written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("token blacklist unavailable: {0}")]
pub struct BlacklistError(pub String);

/// Store of invalidated token ids (`jti → expires_at`).
///
/// Shared, append-mostly; implementations must tolerate concurrent inserts and
/// lookups. No ordering between entries is required.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Record `jti` as revoked until `expires_at`.
    ///
    /// Insert-if-absent: returns `Ok(false)` when `jti` was already revoked at
    /// `now`, so exactly one of several concurrent callers wins.
    async fn add(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool, BlacklistError>;

    /// Whether `jti` is revoked at `now`.
    async fn contains(&self, jti: &str, now: DateTime<Utc>) -> Result<bool, BlacklistError>;

    /// Drop entries with `now > expires_at`; returns how many were removed.
    async fn prune(&self, now: DateTime<Utc>) -> Result<usize, BlacklistError>;
}

#[async_trait]
impl<S> TokenBlacklist for Arc<S>
where
    S: TokenBlacklist + ?Sized,
{
    async fn add(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool, BlacklistError> {
        (**self).add(jti, expires_at, now).await
    }

    async fn contains(&self, jti: &str, now: DateTime<Utc>) -> Result<bool, BlacklistError> {
        (**self).contains(jti, now).await
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<usize, BlacklistError> {
        (**self).prune(now).await
    }
}

/// In-memory blacklist for tests/dev and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryTokenBlacklist {
    entries: DashMap<String, DateTime<Utc>>,
}

impl InMemoryTokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synchronous insert used by the async impl; the entry lock makes the
    /// check and the write one step.
    pub fn insert(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.entries.entry(jti.to_string()) {
            Entry::Occupied(mut entry) => {
                let live = now <= *entry.get();
                if !live || expires_at > *entry.get() {
                    entry.insert(expires_at);
                }
                !live
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        }
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryTokenBlacklist {
    async fn add(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<bool, BlacklistError> {
        Ok(self.insert(jti, expires_at, now))
    }

    async fn contains(&self, jti: &str, now: DateTime<Utc>) -> Result<bool, BlacklistError> {
        Ok(match self.entries.get(jti) {
            Some(expires_at) => now <= *expires_at,
            None => false,
        })
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<usize, BlacklistError> {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| now <= *expires_at);
        Ok(before.saturating_sub(self.entries.len()))
    }
}
