//! `tenantry-tenancy`: tenant resolution and guard authorization.
//!
//! Framework-agnostic: the HTTP layer extracts the bearer token and host, and
//! maps [`Rejection`] to status codes.

pub mod chain;
pub mod context;
pub mod directory;
pub mod session;

pub use chain::{
    check_tenant_match, Authenticated, ChainState, Rejection, RequestScope, ResolutionChain,
    TokenState, UnauthorizedReason,
};
pub use context::{ConnectionError, ConnectionSwitch, TenantContext};
pub use directory::{
    DirectoryError, Resolution, ResolutionSource, TenantDirectory, TenantRepository,
};
