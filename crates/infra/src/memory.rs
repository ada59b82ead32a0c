//! The in-memory backend wired as one unit: landlord tables, one credential
//! store per guard, a recording connection switch and a blacklist.
//!
//! The recording switch keeps every event for inspection; servers replace it
//! with a [`TracingConnectionSwitch`](crate::TracingConnectionSwitch).

use std::sync::Arc;
use std::time::Duration;

use tenantry_auth::{CredentialProvider, Guard, GuardName, InMemoryTokenBlacklist};

use crate::connection::RecordingConnectionSwitch;
use crate::credentials::InMemoryCredentialProvider;
use crate::directory::InMemoryTenantRepository;
use crate::seed::{DevSeed, SeedError, SeedTargets};

#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    pub tenants: Arc<InMemoryTenantRepository>,
    pub admins: Arc<InMemoryCredentialProvider>,
    pub company_users: Arc<InMemoryCredentialProvider>,
    pub users: Arc<InMemoryCredentialProvider>,
    pub switch: Arc<RecordingConnectionSwitch>,
    pub blacklist: Arc<InMemoryTokenBlacklist>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            tenants: Arc::new(InMemoryTenantRepository::new()),
            admins: Arc::new(InMemoryCredentialProvider::landlord_admins()),
            company_users: Arc::new(InMemoryCredentialProvider::company_users()),
            users: Arc::new(InMemoryCredentialProvider::app_users()),
            switch: Arc::new(RecordingConnectionSwitch::new()),
            blacklist: Arc::new(InMemoryTokenBlacklist::new()),
        }
    }

    pub fn seed(&self, seed: &DevSeed) -> Result<(), SeedError> {
        seed.apply(SeedTargets {
            tenants: &self.tenants,
            admins: &self.admins,
            company_users: &self.company_users,
            users: &self.users,
        })
    }

    pub fn provider(&self, guard: GuardName) -> Arc<dyn CredentialProvider> {
        match guard {
            GuardName::Landlord => self.admins.clone(),
            GuardName::Tenant => self.company_users.clone(),
            GuardName::Api => self.users.clone(),
        }
    }

    /// One guard per name, all with the same token lifetime.
    pub fn guards(&self, ttl: Duration) -> Vec<Guard> {
        GuardName::ALL
            .iter()
            .map(|name| Guard::new(*name, ttl, self.provider(*name)))
            .collect()
    }
}
