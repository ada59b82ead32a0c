//! Guard registry: the immutable table of identity domains.
//!
//! Guards are a closed set known at compile time. The registry is built once at
//! startup; it refuses to build if two guards would accept each other's tokens.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::TokenProfile;
use crate::principal::{BindingTag, PrincipalKind};
use crate::provider::CredentialProvider;

/// Name of an identity domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardName {
    /// Platform administrators.
    Landlord,
    /// Company users of one tenant.
    Tenant,
    /// Generic application users.
    Api,
}

impl GuardName {
    pub const ALL: [GuardName; 3] = [GuardName::Landlord, GuardName::Tenant, GuardName::Api];

    pub fn as_str(self) -> &'static str {
        match self {
            GuardName::Landlord => "landlord",
            GuardName::Tenant => "tenant",
            GuardName::Api => "api",
        }
    }

    /// Principal variant this guard authenticates.
    pub fn principal_kind(self) -> PrincipalKind {
        match self {
            GuardName::Landlord => PrincipalKind::LandlordAdmin,
            GuardName::Tenant => PrincipalKind::TenantUser,
            GuardName::Api => PrincipalKind::GenericUser,
        }
    }
}

impl core::fmt::Display for GuardName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuardName {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landlord" => Ok(GuardName::Landlord),
            "tenant" => Ok(GuardName::Tenant),
            "api" => Ok(GuardName::Api),
            other => Err(RegistryError::UnknownGuard(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown guard '{0}'")]
    UnknownGuard(String),

    #[error("guard '{0}' is registered twice")]
    DuplicateGuard(GuardName),

    #[error("guards '{0}' and '{1}' share a binding tag")]
    DuplicateBindingTag(GuardName, GuardName),

    #[error("guard priority is empty")]
    EmptyPriority,
}

/// A named identity domain with its credential provider and binding tag.
#[derive(Clone)]
pub struct Guard {
    name: GuardName,
    binding_tag: BindingTag,
    ttl: Duration,
    provider: Arc<dyn CredentialProvider>,
}

impl core::fmt::Debug for Guard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Guard")
            .field("name", &self.name)
            .field("binding_tag", &self.binding_tag)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Guard {
    pub fn new(name: GuardName, ttl: Duration, provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            name,
            binding_tag: name.principal_kind().binding_tag(),
            ttl,
            provider,
        }
    }

    pub fn name(&self) -> GuardName {
        self.name
    }

    pub fn principal_kind(&self) -> PrincipalKind {
        self.name.principal_kind()
    }

    pub fn binding_tag(&self) -> &BindingTag {
        &self.binding_tag
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn provider(&self) -> &Arc<dyn CredentialProvider> {
        &self.provider
    }

    pub fn token_profile(&self) -> TokenProfile {
        TokenProfile {
            binding_tag: self.binding_tag.clone(),
            ttl: self.ttl,
        }
    }
}

/// Immutable guard table plus the explicit order in which guards are tried
/// when a route accepts any guard (refresh, logout, me).
#[derive(Debug, Clone)]
pub struct GuardRegistry {
    guards: HashMap<GuardName, Guard>,
    priority: Vec<GuardName>,
}

impl GuardRegistry {
    /// Build the registry, asserting that names and binding tags are unique and
    /// that every guard in `priority` is registered.
    pub fn new(guards: Vec<Guard>, priority: Vec<GuardName>) -> Result<Self, RegistryError> {
        let mut table: HashMap<GuardName, Guard> = HashMap::new();

        for guard in guards {
            if table.contains_key(&guard.name) {
                return Err(RegistryError::DuplicateGuard(guard.name));
            }
            if let Some(clash) = table.values().find(|g| g.binding_tag == guard.binding_tag) {
                return Err(RegistryError::DuplicateBindingTag(clash.name, guard.name));
            }
            table.insert(guard.name, guard);
        }

        if priority.is_empty() {
            return Err(RegistryError::EmptyPriority);
        }
        let mut seen = Vec::with_capacity(priority.len());
        for name in priority {
            if !table.contains_key(&name) {
                return Err(RegistryError::UnknownGuard(name.to_string()));
            }
            if !seen.contains(&name) {
                seen.push(name);
            }
        }

        Ok(Self {
            guards: table,
            priority: seen,
        })
    }

    pub fn resolve(&self, name: GuardName) -> Result<&Guard, RegistryError> {
        self.guards
            .get(&name)
            .ok_or_else(|| RegistryError::UnknownGuard(name.to_string()))
    }

    /// Resolve a guard by its configured string name.
    pub fn resolve_named(&self, name: &str) -> Result<&Guard, RegistryError> {
        self.resolve(name.parse()?)
    }

    pub fn expected_binding_tag(&self, name: GuardName) -> Result<&BindingTag, RegistryError> {
        self.resolve(name).map(Guard::binding_tag)
    }

    /// Guards in the configured fallback order.
    pub fn by_priority(&self) -> impl Iterator<Item = &Guard> {
        self.priority.iter().filter_map(|name| self.guards.get(name))
    }

    pub fn priority(&self) -> &[GuardName] {
        &self.priority
    }
}
