use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tenantry_core::{PrincipalId, StorageScope};

use crate::principal::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Unknown email or wrong password; callers must not tell the two apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Per-guard credential store (external collaborator).
///
/// Lookups run against the storage scope of the current request: landlord
/// admins live in landlord storage, company users in their tenant's database.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Check an email/password pair and return the matching principal.
    async fn verify(
        &self,
        scope: &StorageScope,
        email: &str,
        password: &str,
    ) -> Result<Principal, CredentialError>;

    /// Load the principal a verified token refers to.
    async fn find_by_id(
        &self,
        scope: &StorageScope,
        id: &PrincipalId,
    ) -> Result<Option<Principal>, CredentialError>;
}

#[async_trait]
impl<P> CredentialProvider for Arc<P>
where
    P: CredentialProvider + ?Sized,
{
    async fn verify(
        &self,
        scope: &StorageScope,
        email: &str,
        password: &str,
    ) -> Result<Principal, CredentialError> {
        (**self).verify(scope, email, password).await
    }

    async fn find_by_id(
        &self,
        scope: &StorageScope,
        id: &PrincipalId,
    ) -> Result<Option<Principal>, CredentialError> {
        (**self).find_by_id(scope, id).await
    }
}
