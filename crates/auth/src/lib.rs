//! `tenantry-auth`: bearer-token authentication boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: credential
//! stores and the revocation store are injected behind traits.

pub mod blacklist;
pub mod claims;
pub mod codec;
pub mod guard;
pub mod principal;
pub mod provider;

pub use blacklist::{BlacklistError, InMemoryTokenBlacklist, TokenBlacklist};
pub use claims::{Claims, ExtraClaims, RESERVED_CLAIMS, TENANT_CLAIM};
pub use codec::{IssuedToken, TokenCodec, TokenConfig, TokenError, TokenProfile};
pub use guard::{Guard, GuardName, GuardRegistry, RegistryError};
pub use principal::{BindingTag, Principal, PrincipalKind};
pub use provider::{CredentialError, CredentialProvider};
