//! Tenant and domain storage adapters.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PgTenantRepository;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use tenantry_core::{Domain, DomainError, Tenant, TenantId};
use tenantry_tenancy::{DirectoryError, TenantRepository};

/// In-memory landlord tables for tests/dev.
///
/// Enforces the domain → tenant foreign key and global domain uniqueness on
/// insert, like the `domains` table constraints.
#[derive(Debug, Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    domains: RwLock<HashMap<String, Domain>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tenant(&self, tenant: Tenant) -> Result<(), DomainError> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| DomainError::Poisoned("tenant table"))?;
        if tenants.contains_key(&tenant.id) {
            return Err(DomainError::already_exists(format!("tenant {}", tenant.id)));
        }
        tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    pub fn insert_domain(&self, domain: Domain) -> Result<(), DomainError> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| DomainError::Poisoned("tenant table"))?;
        if !tenants.contains_key(&domain.tenant_id) {
            return Err(DomainError::UnknownReference(format!(
                "domain '{}' references unknown tenant {}",
                domain.domain, domain.tenant_id
            )));
        }

        let mut domains = self
            .domains
            .write()
            .map_err(|_| DomainError::Poisoned("domain table"))?;
        if domains.contains_key(&domain.domain) {
            return Err(DomainError::already_exists(format!("domain '{}'", domain.domain)));
        }
        domains.insert(domain.domain.clone(), domain);
        Ok(())
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.read().map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn tenant_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, DirectoryError> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| DirectoryError::Backend("tenant table lock poisoned".into()))?;
        Ok(tenants.get(id).cloned())
    }

    async fn domain_by_host(&self, host: &str) -> Result<Option<Domain>, DirectoryError> {
        let domains = self
            .domains
            .read()
            .map_err(|_| DirectoryError::Backend("domain table lock poisoned".into()))?;
        Ok(domains.get(host).cloned())
    }
}
