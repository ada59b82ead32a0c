//! Redis-backed token blacklist (optional).
//!
//! Each revoked `jti` is a key with a TTL (`SET key 1 NX EX ttl`), so Redis
//! drops entries on its own once they can no longer match a usable token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use tenantry_auth::{BlacklistError, TokenBlacklist};

#[derive(Debug, thiserror::Error)]
pub enum RedisBlacklistError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),
}

impl From<RedisBlacklistError> for BlacklistError {
    fn from(err: RedisBlacklistError) -> Self {
        BlacklistError(err.to_string())
    }
}

/// Blacklist shared by every API process through one Redis.
///
/// Holds a reconnecting multiplexed connection; clones are cheap and share it.
#[derive(Clone)]
pub struct RedisTokenBlacklist {
    conn: ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for RedisTokenBlacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTokenBlacklist")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisTokenBlacklist {
    pub async fn connect(
        redis_url: impl AsRef<str>,
        prefix: impl Into<String>,
    ) -> Result<Self, RedisBlacklistError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisBlacklistError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| RedisBlacklistError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn key(&self, jti: &str) -> String {
        blacklist_key(&self.prefix, jti)
    }
}

fn blacklist_key(prefix: &str, jti: &str) -> String {
    format!("{prefix}:{jti}")
}

/// Seconds until `expires_at`, never below one so the key is always written.
fn ttl_secs(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((expires_at - now).num_seconds()).unwrap_or(0).max(1)
}

#[async_trait]
impl TokenBlacklist for RedisTokenBlacklist {
    async fn add(
        &self,
        jti: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, BlacklistError> {
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(self.key(jti))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(expires_at, now))
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisBlacklistError::Command(e.to_string()))?;
        Ok(set.is_some())
    }

    async fn contains(&self, jti: &str, _now: DateTime<Utc>) -> Result<bool, BlacklistError> {
        let mut conn = self.conn.clone();
        let found: bool = conn
            .exists(self.key(jti))
            .await
            .map_err(|e| RedisBlacklistError::Command(e.to_string()))?;
        Ok(found)
    }

    async fn prune(&self, _now: DateTime<Utc>) -> Result<usize, BlacklistError> {
        // Keys expire server-side.
        Ok(0)
    }
}
