//! Strongly-typed identifiers used across the workspace.
//!
//! Identifiers are opaque strings: tenants and principals created by external
//! registration paths may use any stable scheme (UUIDs, slugs, numeric keys).

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a tenant (multi-tenant boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of an authenticated principal (admin, company user, app user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

/// Identifier of a domain (hostname) record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty identifier", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(PrincipalId, "PrincipalId");
impl_string_newtype!(DomainId, "DomainId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_rejects_empty() {
        let id: TenantId = "  acme  ".parse().unwrap();
        assert_eq!(id.as_str(), "acme");

        let err = "   ".parse::<PrincipalId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.contains("PrincipalId")));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(TenantId::new(), TenantId::new());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id: PrincipalId = "A1".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"A1\"");
    }
}
