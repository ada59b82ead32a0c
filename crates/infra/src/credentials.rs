//! In-memory credential providers.
//!
//! Password hashing is not this system's concern; records store a salted
//! SHA-256 digest so plaintext never sits in memory after seeding.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use tenantry_auth::{CredentialError, CredentialProvider, Principal, PrincipalKind};
use tenantry_core::{DomainError, PrincipalId, StorageScope, TenantId};

/// Where a provider's identity records live.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordStorage {
    /// Landlord storage; lookups ignore the active tenant.
    Landlord,
    /// Each tenant's database; lookups without an active tenant find nothing.
    PerTenant,
}

#[derive(Debug, Clone)]
struct StoredCredential {
    principal: Principal,
    salt: String,
    digest: String,
}

type Partition = Option<TenantId>;

#[derive(Debug)]
pub struct InMemoryCredentialProvider {
    kind: PrincipalKind,
    storage: RecordStorage,
    // (partition, lower-cased email) → record
    records: RwLock<HashMap<(Partition, String), StoredCredential>>,
}

impl InMemoryCredentialProvider {
    pub fn new(kind: PrincipalKind, storage: RecordStorage) -> Self {
        Self {
            kind,
            storage,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Landlord admins, stored in landlord storage.
    pub fn landlord_admins() -> Self {
        Self::new(PrincipalKind::LandlordAdmin, RecordStorage::Landlord)
    }

    /// Company users, stored per tenant.
    pub fn company_users() -> Self {
        Self::new(PrincipalKind::TenantUser, RecordStorage::PerTenant)
    }

    /// Generic application users, stored in landlord storage.
    pub fn app_users() -> Self {
        Self::new(PrincipalKind::GenericUser, RecordStorage::Landlord)
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// Register an identity. `tenant_id` is required for per-tenant storage
    /// and rejected for landlord storage.
    pub fn register(
        &self,
        id: PrincipalId,
        name: &str,
        email: &str,
        password: &str,
        tenant_id: Option<TenantId>,
    ) -> Result<Principal, DomainError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(DomainError::validation("email must not be empty"));
        }

        let partition = match (self.storage, tenant_id) {
            (RecordStorage::Landlord, None) => None,
            (RecordStorage::Landlord, Some(_)) => {
                return Err(DomainError::validation("landlord-stored principals have no tenant"));
            }
            (RecordStorage::PerTenant, Some(t)) => Some(t),
            (RecordStorage::PerTenant, None) => {
                return Err(DomainError::validation("tenant user requires a tenant_id"));
            }
        };

        let mut principal = Principal::new(id, self.kind, name, email);
        if let Some(tenant_id) = &partition {
            principal = principal.in_tenant(tenant_id.clone());
        }

        let salt = principal.id.to_string();
        let record = StoredCredential {
            principal: principal.clone(),
            digest: digest(&salt, password),
            salt,
        };

        let mut records = self
            .records
            .write()
            .map_err(|_| DomainError::Poisoned("credential store"))?;
        let key = (partition, email.to_ascii_lowercase());
        if records.contains_key(&key) {
            return Err(DomainError::already_exists(format!("email '{email}'")));
        }
        records.insert(key, record);
        Ok(principal)
    }

    fn partition(&self, scope: &StorageScope) -> Option<Partition> {
        match self.storage {
            RecordStorage::Landlord => Some(None),
            RecordStorage::PerTenant => scope.tenant_id().cloned().map(Some),
        }
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl CredentialProvider for InMemoryCredentialProvider {
    async fn verify(
        &self,
        scope: &StorageScope,
        email: &str,
        password: &str,
    ) -> Result<Principal, CredentialError> {
        let Some(partition) = self.partition(scope) else {
            return Err(CredentialError::InvalidCredentials);
        };
        let records = self
            .records
            .read()
            .map_err(|_| CredentialError::Unavailable("credential store lock poisoned".into()))?;

        let Some(record) = records.get(&(partition, email.trim().to_ascii_lowercase())) else {
            return Err(CredentialError::InvalidCredentials);
        };

        let candidate = digest(&record.salt, password);
        if bool::from(candidate.as_bytes().ct_eq(record.digest.as_bytes())) {
            Ok(record.principal.clone())
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }

    async fn find_by_id(
        &self,
        scope: &StorageScope,
        id: &PrincipalId,
    ) -> Result<Option<Principal>, CredentialError> {
        let Some(partition) = self.partition(scope) else {
            return Ok(None);
        };
        let records = self
            .records
            .read()
            .map_err(|_| CredentialError::Unavailable("credential store lock poisoned".into()))?;

        Ok(records
            .iter()
            .find(|((p, _), record)| *p == partition && record.principal.id == *id)
            .map(|(_, record)| record.principal.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantry_core::Tenant;

    fn pid(s: &str) -> PrincipalId {
        s.parse().unwrap()
    }

    fn tenant_scope(id: &str) -> StorageScope {
        StorageScope::for_tenant(&Tenant::new(id.parse().unwrap(), format!("db_{id}")).unwrap())
    }

    #[tokio::test]
    async fn landlord_records_ignore_the_active_tenant() {
        let admins = InMemoryCredentialProvider::landlord_admins();
        admins.register(pid("A1"), "Admin", "admin@example.com", "secret", None).unwrap();

        let p = admins
            .verify(&tenant_scope("t1"), "Admin@Example.com", "secret")
            .await
            .unwrap();
        assert_eq!(p.id, pid("A1"));
        assert_eq!(p.kind, PrincipalKind::LandlordAdmin);
        assert!(admins.find_by_id(&StorageScope::Landlord, &pid("A1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let admins = InMemoryCredentialProvider::landlord_admins();
        admins.register(pid("A1"), "Admin", "admin@example.com", "secret", None).unwrap();

        let wrong = admins.verify(&StorageScope::Landlord, "admin@example.com", "nope").await;
        let unknown = admins.verify(&StorageScope::Landlord, "who@example.com", "secret").await;
        assert_eq!(wrong, Err(CredentialError::InvalidCredentials));
        assert_eq!(unknown, wrong);
    }

    #[tokio::test]
    async fn tenant_users_are_partitioned_by_tenant() {
        let users = InMemoryCredentialProvider::company_users();
        let t1: TenantId = "t1".parse().unwrap();
        users
            .register(pid("U1"), "User", "u@example.com", "pw", Some(t1.clone()))
            .unwrap();

        let p = users.verify(&tenant_scope("t1"), "u@example.com", "pw").await.unwrap();
        assert_eq!(p.tenant_id, Some(t1));

        assert!(users.verify(&tenant_scope("t2"), "u@example.com", "pw").await.is_err());
        assert!(users.verify(&StorageScope::Landlord, "u@example.com", "pw").await.is_err());
        assert!(users.find_by_id(&tenant_scope("t2"), &pid("U1")).await.unwrap().is_none());
        assert!(users.find_by_id(&StorageScope::Landlord, &pid("U1")).await.unwrap().is_none());
    }

    #[test]
    fn registration_rules() {
        let users = InMemoryCredentialProvider::company_users();
        assert!(users.register(pid("U1"), "U", "u@example.com", "pw", None).is_err());

        let admins = InMemoryCredentialProvider::landlord_admins();
        assert!(admins
            .register(pid("A1"), "A", "a@example.com", "pw", Some("t1".parse().unwrap()))
            .is_err());
        admins.register(pid("A1"), "A", "a@example.com", "pw", None).unwrap();
        assert!(admins.register(pid("A2"), "A", "A@example.com", "pw", None).is_err());
    }
}
