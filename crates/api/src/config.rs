//! Process configuration, read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use tenantry_auth::{GuardName, TokenConfig};

const DEV_SECRET: &str = "tenantry-insecure-development-secret";
const MIN_SECRET_LEN: usize = 32;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listen address (`TENANTRY_BIND_ADDR`).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub jwt: JwtSettings,

    /// Order in which guards are tried by refresh, logout and me
    /// (`AUTH_GUARD_PRIORITY`).
    #[serde(default = "default_priority")]
    pub guard_priority: Vec<GuardName>,

    /// JSON seed for the in-memory backend (`TENANTRY_SEED_FILE`).
    #[serde(default)]
    pub seed_file: Option<PathBuf>,

    /// Name reported for landlord storage (`TENANTRY_LANDLORD_DATABASE`).
    #[serde(default = "default_landlord_database")]
    pub landlord_database: String,

    /// Seconds between blacklist prune runs (`TENANTRY_BLACKLIST_PRUNE_SECS`).
    #[serde(default = "default_prune_secs")]
    pub blacklist_prune_secs: u64,

    /// Landlord Postgres (`DATABASE_URL`); used with the `postgres` feature.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Shared blacklist (`REDIS_URL`); used with the `redis` feature.
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    #[serde(default = "default_secret")]
    pub secret: String,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Lifetime of newly issued tokens, for every guard.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    #[serde(default)]
    pub refresh_grace_secs: u64,

    #[serde(default)]
    pub refresh_iat: bool,

    #[serde(default)]
    pub leeway_secs: u64,

    #[serde(default = "default_true")]
    pub blacklist_enabled: bool,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            issuer: default_issuer(),
            ttl_minutes: default_ttl_minutes(),
            refresh_grace_secs: 0,
            refresh_iat: false,
            leeway_secs: 0,
            blacklist_enabled: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            jwt: JwtSettings::default(),
            guard_priority: default_priority(),
            seed_file: None,
            landlord_database: default_landlord_database(),
            blacklist_prune_secs: default_prune_secs(),
            database_url: None,
            redis_url: None,
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_priority() -> Vec<GuardName> {
    vec![GuardName::Landlord, GuardName::Tenant, GuardName::Api]
}

fn default_landlord_database() -> String {
    "landlord".to_string()
}

fn default_prune_secs() -> u64 {
    60
}

fn default_secret() -> String {
    DEV_SECRET.to_string()
}

fn default_issuer() -> String {
    "tenantry".to_string()
}

fn default_ttl_minutes() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; unset keys fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt.secret.clone()
            }
        };
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if secret.len() < MIN_SECRET_LEN {
            tracing::warn!(len = secret.len(), "JWT_SECRET is shorter than {MIN_SECRET_LEN} bytes");
        }

        let guard_priority = match get("AUTH_GUARD_PRIORITY") {
            Some(raw) => parse_priority(&raw)?,
            None => defaults.guard_priority,
        };

        Ok(Self {
            bind_addr: get("TENANTRY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt: JwtSettings {
                secret,
                issuer: get("JWT_ISSUER").unwrap_or(defaults.jwt.issuer),
                ttl_minutes: parse_var(&get, "JWT_TTL_MINUTES", defaults.jwt.ttl_minutes)?,
                refresh_grace_secs: parse_var(
                    &get,
                    "JWT_REFRESH_GRACE_SECONDS",
                    defaults.jwt.refresh_grace_secs,
                )?,
                refresh_iat: parse_flag(&get, "JWT_REFRESH_IAT", defaults.jwt.refresh_iat)?,
                leeway_secs: parse_var(&get, "JWT_LEEWAY_SECONDS", defaults.jwt.leeway_secs)?,
                blacklist_enabled: parse_flag(
                    &get,
                    "JWT_BLACKLIST_ENABLED",
                    defaults.jwt.blacklist_enabled,
                )?,
            },
            guard_priority,
            seed_file: get("TENANTRY_SEED_FILE").map(PathBuf::from),
            landlord_database: get("TENANTRY_LANDLORD_DATABASE").unwrap_or(defaults.landlord_database),
            blacklist_prune_secs: parse_var(
                &get,
                "TENANTRY_BLACKLIST_PRUNE_SECS",
                defaults.blacklist_prune_secs,
            )?,
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
        })
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt.secret.clone(),
            issuer: self.jwt.issuer.clone(),
            refresh_grace_secs: self.jwt.refresh_grace_secs,
            refresh_iat: self.jwt.refresh_iat,
            leeway_secs: self.jwt.leeway_secs,
            blacklist_enabled: self.jwt.blacklist_enabled,
        }
    }

    pub fn guard_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt.ttl_minutes.saturating_mul(60))
    }

    pub fn blacklist_prune_interval(&self) -> Duration {
        Duration::from_secs(self.blacklist_prune_secs.max(1))
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: '{raw}'")),
        None => Ok(default),
    }
}

fn parse_flag(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> anyhow::Result<bool> {
    match get(key).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => bail!("invalid {key}: '{v}' (expected true/false)"),
    }
}

fn parse_priority(raw: &str) -> anyhow::Result<Vec<GuardName>> {
    let names = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<GuardName>())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid AUTH_GUARD_PRIORITY")?;
    if names.is_empty() {
        bail!("AUTH_GUARD_PRIORITY must name at least one guard");
    }
    Ok(names)
}
