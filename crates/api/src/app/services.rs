//! Backend wiring: picks the storage adapters and assembles the resolution
//! chain shared by every request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;

use tenantry_auth::{Guard, GuardRegistry, TokenBlacklist, TokenCodec};
use tenantry_infra::{DevSeed, InMemoryBackend, TracingConnectionSwitch};
use tenantry_tenancy::{ConnectionSwitch, ResolutionChain, TenantDirectory, TenantRepository};

use crate::config::AppConfig;

/// Shared, immutable application state.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<ResolutionChain>,
    pub codec: Arc<TokenCodec>,
    pub landlord_database: Arc<str>,
}

impl core::fmt::Debug for AppState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppState")
            .field("chain", &self.chain)
            .field("landlord_database", &self.landlord_database)
            .finish()
    }
}

/// The collaborator implementations a chain is built from.
pub struct Backends {
    pub tenants: Arc<dyn TenantRepository>,
    pub switch: Arc<dyn ConnectionSwitch>,
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub guards: Vec<Guard>,
}

impl Backends {
    pub fn in_memory(backend: &InMemoryBackend, config: &AppConfig) -> Self {
        Self {
            tenants: backend.tenants.clone(),
            switch: backend.switch.clone(),
            blacklist: backend.blacklist.clone(),
            guards: backend.guards(config.guard_ttl()),
        }
    }
}

/// Assemble the chain. Fails if the guard table is inconsistent, which is a
/// startup error.
pub fn assemble(config: &AppConfig, backends: Backends) -> anyhow::Result<AppState> {
    let registry = GuardRegistry::new(backends.guards, config.guard_priority.clone())
        .context("invalid guard configuration")?;
    let codec = Arc::new(TokenCodec::new(config.token_config(), backends.blacklist));

    let chain = ResolutionChain::new(
        codec.clone(),
        TenantDirectory::new(backends.tenants),
        backends.switch,
        Arc::new(registry),
    );

    tracing::info!(
        priority = ?config.guard_priority,
        ttl_minutes = config.jwt.ttl_minutes,
        blacklist_enabled = config.jwt.blacklist_enabled,
        "resolution chain ready"
    );

    Ok(AppState {
        chain: Arc::new(chain),
        codec,
        landlord_database: Arc::from(config.landlord_database.as_str()),
    })
}

/// Build state from configuration: in-memory stores seeded from
/// `seed_file`, replaced by Postgres and Redis adapters when those features
/// are enabled and configured.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let backend = InMemoryBackend::new();
    if let Some(path) = &config.seed_file {
        let seed = DevSeed::from_path(path)
            .with_context(|| format!("failed to load seed file {}", path.display()))?;
        backend.seed(&seed).context("failed to apply seed")?;
    }

    let mut backends = Backends::in_memory(&backend, config);
    backends.switch = Arc::new(TracingConnectionSwitch);

    #[cfg(feature = "postgres")]
    {
        if let Some(url) = &config.database_url {
            use tenantry_infra::connection::PgPoolRegistry;
            use tenantry_infra::directory::PgTenantRepository;

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("failed to connect to landlord database")?;
            let registry = PgPoolRegistry::new(pool, url).context("invalid DATABASE_URL")?;
            backends.tenants = Arc::new(PgTenantRepository::new(registry.landlord().clone()));
            backends.switch = Arc::new(registry);
            tracing::info!("using postgres tenant directory");
        }
    }
    #[cfg(not(feature = "postgres"))]
    {
        if config.database_url.is_some() {
            tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; using in-memory tenants");
        }
    }
    #[cfg(feature = "redis")]
    {
        if let Some(url) = &config.redis_url {
            use tenantry_infra::blacklist::RedisTokenBlacklist;

            let blacklist = RedisTokenBlacklist::connect(url, "tenantry:blacklist")
                .await
                .context("failed to connect to redis")?;
            backends.blacklist = Arc::new(blacklist);
            tracing::info!("using redis token blacklist");
        }
    }
    #[cfg(not(feature = "redis"))]
    {
        if config.redis_url.is_some() {
            tracing::warn!("REDIS_URL is set but the redis feature is disabled; using in-memory blacklist");
        }
    }
    assemble(config, backends)
}

/// Periodically drop blacklist entries that can no longer match a token.
pub fn spawn_blacklist_pruner(codec: Arc<TokenCodec>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match codec.prune_blacklist(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "pruned token blacklist"),
                Err(err) => tracing::warn!(error = %err, "token blacklist prune failed"),
            }
        }
    })
}
