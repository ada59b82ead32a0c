//! Per-tenant Postgres pools.
//!
//! Each tenant database gets one lazily connected pool derived from the
//! landlord connection options with the database name swapped. Storage code
//! asks the registry for the pool matching its request's `StorageScope`.

use std::str::FromStr;

use dashmap::DashMap;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use tenantry_core::StorageScope;
use tenantry_tenancy::{ConnectionError, ConnectionSwitch};

const TENANT_POOL_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug)]
pub struct PgPoolRegistry {
    landlord: PgPool,
    base: PgConnectOptions,
    tenants: DashMap<String, PgPool>,
}

impl PgPoolRegistry {
    pub fn new(landlord: PgPool, database_url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            landlord,
            base: PgConnectOptions::from_str(database_url)?,
            tenants: DashMap::new(),
        })
    }

    pub fn landlord(&self) -> &PgPool {
        &self.landlord
    }

    /// Pool for the given scope; `None` if the tenant was never activated.
    pub fn pool_for(&self, scope: &StorageScope) -> Option<PgPool> {
        match scope {
            StorageScope::Landlord => Some(self.landlord.clone()),
            StorageScope::Tenant { database_ref, .. } => {
                self.tenants.get(database_ref).map(|p| p.clone())
            }
        }
    }
}

impl ConnectionSwitch for PgPoolRegistry {
    fn use_connection(&self, database_ref: &str) -> Result<(), ConnectionError> {
        if database_ref.trim().is_empty() {
            return Err(ConnectionError::Unavailable(
                database_ref.to_string(),
                "empty database name".to_string(),
            ));
        }
        if self.tenants.contains_key(database_ref) {
            return Ok(());
        }

        let options = self.base.clone().database(database_ref);
        let pool = PgPoolOptions::new()
            .max_connections(TENANT_POOL_MAX_CONNECTIONS)
            .connect_lazy_with(options);
        self.tenants.entry(database_ref.to_string()).or_insert(pool);
        tracing::debug!(database = database_ref, "tenant pool registered");
        Ok(())
    }

    fn use_landlord_connection(&self) {
        // Pools are selected per request scope; nothing to reset.
    }
}
