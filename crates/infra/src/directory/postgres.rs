//! Postgres-backed landlord tables.
//!
//! Reads the `tenants` (`id, database_name, data, is_active`) and `domains`
//! (`id, tenant_id, domain`) tables. Writes are handled by the administrative
//! tooling and never happen here.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgPool, Row};

use tenantry_core::{Domain, DomainId, Tenant, TenantId};
use tenantry_tenancy::{DirectoryError, TenantRepository};

#[derive(Debug, Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::Backend(err.to_string())
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn tenant_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id::text AS id, database_name, data, is_active
            FROM tenants
            WHERE id::text = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id").map_err(backend)?;
        let database_ref: String = row.try_get("database_name").map_err(backend)?;
        let data: Option<JsonValue> = row.try_get("data").map_err(backend)?;
        let is_active: bool = row.try_get("is_active").map_err(backend)?;

        let data = match data {
            Some(JsonValue::Object(map)) => map,
            _ => Map::new(),
        };

        let mut tenant = Tenant::new(id.parse().map_err(backend)?, database_ref)
            .map_err(backend)?
            .with_data(data);
        tenant.is_active = is_active;
        Ok(Some(tenant))
    }

    async fn domain_by_host(&self, host: &str) -> Result<Option<Domain>, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id::text AS id, tenant_id::text AS tenant_id, domain
            FROM domains
            WHERE domain = $1
            "#,
        )
        .bind(host)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id").map_err(backend)?;
        let tenant_id: String = row.try_get("tenant_id").map_err(backend)?;
        let domain: String = row.try_get("domain").map_err(backend)?;

        let id: DomainId = id.parse().map_err(backend)?;
        let domain = Domain::new(id, tenant_id.parse().map_err(backend)?, &domain).map_err(backend)?;
        Ok(Some(domain))
    }
}
