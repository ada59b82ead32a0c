use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use tenantry_core::{PrincipalId, TenantId};

use crate::principal::BindingTag;

/// Claim names the codec owns; caller-supplied extra claims never override them.
pub const RESERVED_CLAIMS: [&str; 7] = ["sub", "iss", "iat", "exp", "nbf", "jti", "prv"];

/// Claim carrying the tenant a token was issued for.
pub const TENANT_CLAIM: &str = "tenant_id";

/// Decoded, verified payload of a bearer token.
///
/// Reconstructed on every verification; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    pub iss: String,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    pub nbf: i64,

    pub exp: i64,

    /// Unique token id; the blacklist key.
    pub jti: String,

    /// Guard binding tag.
    pub prv: BindingTag,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    /// Any other caller-supplied claims, preserved across refresh.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }

    /// Lifetime the token was issued with (`exp - nbf`), in seconds.
    pub fn lifetime_secs(&self) -> i64 {
        (self.exp - self.nbf).max(0)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Extra claims merged into a token at issue time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraClaims {
    pub tenant_id: Option<TenantId>,
    pub custom: Map<String, JsonValue>,
}

impl ExtraClaims {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            custom: Map::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}
