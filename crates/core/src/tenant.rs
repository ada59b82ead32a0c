//! Landlord data model: tenants, their hostnames, and storage scopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::DomainError;
use crate::id::{DomainId, TenantId};

/// An isolated customer scope with its own storage.
///
/// `id` and `database_ref` never change after creation; changing the database
/// reference would orphan the tenant's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub database_ref: String,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Tenant {
    pub fn new(id: TenantId, database_ref: impl Into<String>) -> Result<Self, DomainError> {
        let database_ref = database_ref.into();
        if database_ref.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "tenant {id}: database_ref must not be empty"
            )));
        }

        Ok(Self {
            id,
            database_ref,
            data: Map::new(),
            is_active: true,
        })
    }

    pub fn with_data(mut self, data: Map<String, JsonValue>) -> Self {
        self.data = data;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A hostname owned by exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub tenant_id: TenantId,
    pub domain: String,
}

impl Domain {
    /// Build a domain record; the hostname is stored normalized.
    pub fn new(id: DomainId, tenant_id: TenantId, domain: &str) -> Result<Self, DomainError> {
        let domain = normalize_host(domain)
            .ok_or_else(|| DomainError::validation("domain must be a non-empty hostname"))?;
        Ok(Self { id, tenant_id, domain })
    }
}

/// Normalize a request host for exact matching: strip the port, trim a
/// trailing dot, lower-case. Returns `None` for empty hosts.
pub fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();

    // Bracketed IPv6 literal, optionally followed by a port.
    let host = if let Some(rest) = raw.strip_prefix('[') {
        let end = rest.find(']')?;
        &rest[..end]
    } else {
        match raw.rsplit_once(':') {
            Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) && !h.contains(':') => h,
            _ => raw,
        }
    };

    let host = host.trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Which storage the current unit of work reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "connection", rename_all = "snake_case")]
pub enum StorageScope {
    /// Platform-wide storage (tenants, domains, landlord admins).
    Landlord,
    /// One tenant's isolated database.
    Tenant {
        tenant_id: TenantId,
        database_ref: String,
    },
}

impl StorageScope {
    pub fn for_tenant(tenant: &Tenant) -> Self {
        Self::Tenant {
            tenant_id: tenant.id.clone(),
            database_ref: tenant.database_ref.clone(),
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            StorageScope::Landlord => None,
            StorageScope::Tenant { tenant_id, .. } => Some(tenant_id),
        }
    }

    pub fn is_landlord(&self) -> bool {
        matches!(self, StorageScope::Landlord)
    }
}
