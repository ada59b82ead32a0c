//! Request-scoped tenant context.
//!
//! One `TenantContext` exists per request. It is created empty, activated at
//! most once by the resolution chain, and always returns to the landlord scope
//! when dropped, so nothing outlives the request that created it.

use std::sync::Arc;

use thiserror::Error;

use tenantry_core::{StorageScope, Tenant};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("tenant database '{0}' is unavailable: {1}")]
    Unavailable(String, String),
}

/// Storage connection switch (external collaborator).
///
/// `use_connection` prepares the tenant database named by `database_ref` for
/// the current unit of work; `use_landlord_connection` reverts to landlord
/// storage.
pub trait ConnectionSwitch: Send + Sync {
    fn use_connection(&self, database_ref: &str) -> Result<(), ConnectionError>;

    fn use_landlord_connection(&self);
}

impl<S> ConnectionSwitch for Arc<S>
where
    S: ConnectionSwitch + ?Sized,
{
    fn use_connection(&self, database_ref: &str) -> Result<(), ConnectionError> {
        (**self).use_connection(database_ref)
    }

    fn use_landlord_connection(&self) {
        (**self).use_landlord_connection()
    }
}

pub struct TenantContext {
    current: Option<Tenant>,
    switch: Arc<dyn ConnectionSwitch>,
}

impl core::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantContext")
            .field("current", &self.current.as_ref().map(|t| &t.id))
            .finish_non_exhaustive()
    }
}

impl TenantContext {
    pub fn new(switch: Arc<dyn ConnectionSwitch>) -> Self {
        Self {
            current: None,
            switch,
        }
    }

    /// Make `tenant` current and switch storage to its database.
    ///
    /// Activating the tenant that is already current is a no-op. On a switch
    /// failure the context is left unchanged.
    pub fn activate(&mut self, tenant: Tenant) -> Result<(), ConnectionError> {
        if self.current.as_ref().is_some_and(|t| t.id == tenant.id) {
            return Ok(());
        }

        self.switch.use_connection(&tenant.database_ref)?;
        tracing::debug!(tenant_id = %tenant.id, database = %tenant.database_ref, "tenant activated");
        self.current = Some(tenant);
        Ok(())
    }

    pub fn current(&self) -> Option<&Tenant> {
        self.current.as_ref()
    }

    /// Clear the current tenant and revert to landlord storage.
    pub fn deactivate(&mut self) {
        if let Some(tenant) = self.current.take() {
            self.switch.use_landlord_connection();
            tracing::debug!(tenant_id = %tenant.id, "tenant deactivated");
        }
    }

    /// Storage scope every data access in this request must use.
    pub fn storage_scope(&self) -> StorageScope {
        match &self.current {
            Some(tenant) => StorageScope::for_tenant(tenant),
            None => StorageScope::Landlord,
        }
    }
}

impl Drop for TenantContext {
    fn drop(&mut self) {
        self.deactivate();
    }
}
