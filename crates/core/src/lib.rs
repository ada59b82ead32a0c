//! `tenantry-core`: shared identifiers and the landlord data model.
//!
//! This crate contains **pure data** (no storage, no transport).

pub mod error;
pub mod id;
pub mod tenant;

pub use error::DomainError;
pub use id::{DomainId, PrincipalId, TenantId};
pub use tenant::{normalize_host, Domain, StorageScope, Tenant};
