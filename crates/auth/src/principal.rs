use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use tenantry_core::{PrincipalId, TenantId};

/// The closed set of identity record types.
///
/// Each variant belongs to exactly one guard and derives that guard's binding
/// tag from its fully-qualified type name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Platform administrator, stored in landlord storage.
    LandlordAdmin,
    /// Company user, stored in its tenant's database.
    TenantUser,
    /// Generic application user.
    GenericUser,
}

impl PrincipalKind {
    pub const ALL: [PrincipalKind; 3] = [
        PrincipalKind::LandlordAdmin,
        PrincipalKind::TenantUser,
        PrincipalKind::GenericUser,
    ];

    /// Stable, fully-qualified type name the binding tag is derived from.
    ///
    /// Changing one of these invalidates every outstanding token of that kind.
    pub fn type_name(self) -> &'static str {
        match self {
            PrincipalKind::LandlordAdmin => "tenantry::landlord::Admin",
            PrincipalKind::TenantUser => "tenantry::tenant::CompanyUser",
            PrincipalKind::GenericUser => "tenantry::app::User",
        }
    }

    pub fn binding_tag(self) -> BindingTag {
        BindingTag::derive(self.type_name())
    }
}

/// Value embedded in every token (`prv` claim) tying it to one guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingTag(String);

impl BindingTag {
    /// Hex-encoded SHA-256 of the given type name.
    pub fn derive(type_name: &str) -> Self {
        let digest = Sha256::digest(type_name.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a tag carried by a token.
    pub fn matches(&self, other: &BindingTag) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl core::fmt::Display for BindingTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identity record as returned by a credential provider.
///
/// The credential hash never leaves the provider, so it is not part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: PrincipalId,
    #[serde(skip)]
    pub kind: PrincipalKind,
    pub name: String,
    pub email: String,
    /// Set for tenant users only; embedded as the `tenant_id` claim at login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
}

impl Principal {
    pub fn new(
        id: PrincipalId,
        kind: PrincipalKind,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            email: email.into(),
            tenant_id: None,
        }
    }

    pub fn in_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }
}
