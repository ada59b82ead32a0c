//! Tenant directory: maps a token claim or a request host to a tenant.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tenantry_auth::Claims;
use tenantry_core::{normalize_host, Domain, Tenant, TenantId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("tenant not found")]
    NotFound,

    /// A domain row points at a tenant that does not exist.
    #[error("domain '{domain}' references missing tenant {tenant_id}")]
    DanglingDomain { domain: String, tenant_id: TenantId },

    #[error("tenant lookup failed: {0}")]
    Backend(String),
}

/// Read-only landlord storage of tenants and domains (external collaborator).
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn tenant_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, DirectoryError>;

    /// Exact lookup on an already normalized hostname.
    async fn domain_by_host(&self, host: &str) -> Result<Option<Domain>, DirectoryError>;
}

#[async_trait]
impl<R> TenantRepository for Arc<R>
where
    R: TenantRepository + ?Sized,
{
    async fn tenant_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, DirectoryError> {
        (**self).tenant_by_id(id).await
    }

    async fn domain_by_host(&self, host: &str) -> Result<Option<Domain>, DirectoryError> {
        (**self).domain_by_host(host).await
    }
}

/// Which strategy produced the active tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    Token,
    Host,
    Unresolved,
}

impl ResolutionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionSource::Token => "token",
            ResolutionSource::Host => "host",
            ResolutionSource::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub tenant: Option<Tenant>,
    pub source: ResolutionSource,
}

impl Resolution {
    pub fn unresolved() -> Self {
        Self {
            tenant: None,
            source: ResolutionSource::Unresolved,
        }
    }
}

#[derive(Clone)]
pub struct TenantDirectory {
    repo: Arc<dyn TenantRepository>,
}

impl core::fmt::Debug for TenantDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantDirectory").finish_non_exhaustive()
    }
}

impl TenantDirectory {
    pub fn new(repo: Arc<dyn TenantRepository>) -> Self {
        Self { repo }
    }

    /// Active tenant with this id. Inactive tenants are reported as not found.
    pub async fn find_by_tenant_id(&self, id: &TenantId) -> Result<Tenant, DirectoryError> {
        match self.repo.tenant_by_id(id).await? {
            Some(tenant) if tenant.is_active => Ok(tenant),
            Some(_) => {
                tracing::debug!(tenant_id = %id, "tenant is inactive");
                Err(DirectoryError::NotFound)
            }
            None => Err(DirectoryError::NotFound),
        }
    }

    /// Exact hostname match, then follow the domain's tenant relation.
    ///
    /// The port is stripped and the host lower-cased before matching; no
    /// wildcard or subdomain matching is performed.
    pub async fn find_by_host(&self, raw_host: &str) -> Result<Tenant, DirectoryError> {
        let host = normalize_host(raw_host).ok_or(DirectoryError::NotFound)?;
        let domain = self
            .repo
            .domain_by_host(&host)
            .await?
            .ok_or(DirectoryError::NotFound)?;

        match self.find_by_tenant_id(&domain.tenant_id).await {
            Err(DirectoryError::NotFound) => match self.repo.tenant_by_id(&domain.tenant_id).await? {
                // Exists but inactive.
                Some(_) => Err(DirectoryError::NotFound),
                None => Err(DirectoryError::DanglingDomain {
                    domain: domain.domain,
                    tenant_id: domain.tenant_id,
                }),
            },
            other => other,
        }
    }

    /// Apply the resolution precedence: a verified token's `tenant_id` claim
    /// first, then the request host, else no tenant.
    ///
    /// Never fails. Lookup errors are logged as warnings and fall through to the
    /// next strategy.
    pub async fn resolve(&self, claims: Option<&Claims>, host: Option<&str>) -> Resolution {
        let claimed = claims
            .and_then(|c| c.tenant_id.as_ref())
            .filter(|id| !id.as_str().is_empty());

        if let Some(tenant_id) = claimed {
            match self.find_by_tenant_id(tenant_id).await {
                Ok(tenant) => {
                    return Resolution {
                        tenant: Some(tenant),
                        source: ResolutionSource::Token,
                    };
                }
                Err(DirectoryError::NotFound) => {
                    tracing::warn!(tenant_id = %tenant_id, "token tenant not found; trying host");
                }
                Err(err) => {
                    tracing::warn!(tenant_id = %tenant_id, error = %err, "token tenant lookup failed; trying host");
                }
            }
        }

        if let Some(host) = host {
            match self.find_by_host(host).await {
                Ok(tenant) => {
                    return Resolution {
                        tenant: Some(tenant),
                        source: ResolutionSource::Host,
                    };
                }
                Err(DirectoryError::NotFound) => {
                    tracing::debug!(host, "no tenant for host");
                }
                Err(err) => {
                    tracing::warn!(host, error = %err, "host tenant lookup failed");
                }
            }
        }

        Resolution::unresolved()
    }
}
