//! Development seed: tenants, domains and identities loaded from JSON.
//!
//! ```json
//! {
//!   "tenants": [
//!     { "id": "acme", "database_ref": "tenant_acme", "domains": ["acme.localhost"] }
//!   ],
//!   "admins": [
//!     { "id": "A1", "name": "Root", "email": "root@example.com", "password": "secret" }
//!   ],
//!   "company_users": [
//!     { "id": "U1", "tenant_id": "acme", "name": "Ann", "email": "ann@acme.test", "password": "pw" }
//!   ],
//!   "users": []
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use tenantry_core::{Domain, DomainError, DomainId, PrincipalId, Tenant, TenantId};

use crate::credentials::InMemoryCredentialProvider;
use crate::directory::InMemoryTenantRepository;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid seed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid seed record: {0}")]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevSeed {
    #[serde(default)]
    pub tenants: Vec<SeedTenant>,
    #[serde(default)]
    pub admins: Vec<SeedPrincipal>,
    #[serde(default)]
    pub company_users: Vec<SeedPrincipal>,
    #[serde(default)]
    pub users: Vec<SeedPrincipal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTenant {
    pub id: TenantId,
    pub database_ref: String,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPrincipal {
    pub id: PrincipalId,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub name: String,
    pub email: String,
    pub password: String,
}

fn default_active() -> bool {
    true
}

/// Identity stores the seed populates, one per guard.
#[derive(Debug, Clone, Copy)]
pub struct SeedTargets<'a> {
    pub tenants: &'a InMemoryTenantRepository,
    pub admins: &'a InMemoryCredentialProvider,
    pub company_users: &'a InMemoryCredentialProvider,
    pub users: &'a InMemoryCredentialProvider,
}

impl DevSeed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Insert every record. Stops at the first invalid one.
    pub fn apply(&self, targets: SeedTargets<'_>) -> Result<(), SeedError> {
        for t in &self.tenants {
            let mut tenant = Tenant::new(t.id.clone(), t.database_ref.clone())?.with_data(t.data.clone());
            tenant.is_active = t.is_active;
            targets.tenants.insert_tenant(tenant)?;

            for host in &t.domains {
                targets
                    .tenants
                    .insert_domain(Domain::new(DomainId::new(), t.id.clone(), host)?)?;
            }
        }

        for (store, records) in [
            (targets.admins, &self.admins),
            (targets.company_users, &self.company_users),
            (targets.users, &self.users),
        ] {
            for p in records {
                store.register(p.id.clone(), &p.name, &p.email, &p.password, p.tenant_id.clone())?;
            }
        }

        tracing::info!(
            tenants = self.tenants.len(),
            admins = self.admins.len(),
            company_users = self.company_users.len(),
            users = self.users.len(),
            "dev seed loaded"
        );
        Ok(())
    }
}
