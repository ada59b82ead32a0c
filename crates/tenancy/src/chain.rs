//! Resolution chain: token → tenant → guard → authorization outcome.
//!
//! The chain is framework-agnostic. An HTTP layer calls [`ResolutionChain::begin`]
//! once per request to build a [`RequestScope`], then [`ResolutionChain::authorize`]
//! for each guarded route.
//!
//! States, per request:
//!
//! ```text
//! START → TENANT_RESOLVED | UNRESOLVED → GUARD_SELECTED → BOUND_VALIDATED
//!       → TENANT_MATCH_VALIDATED → DISPATCHED
//!                        ↘ REJECTED_401 | REJECTED_403
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use tenantry_auth::{
    Claims, CredentialError, Guard, GuardName, GuardRegistry, Principal, TokenCodec, TokenError,
};
use tenantry_core::{StorageScope, Tenant, TenantId};

use crate::context::{ConnectionSwitch, TenantContext};
use crate::directory::{ResolutionSource, TenantDirectory};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChainState {
    Start,
    TenantResolved,
    Unresolved,
    GuardSelected,
    BoundValidated,
    TenantMatchValidated,
    Dispatched,
    Rejected401,
    Rejected403,
}

impl ChainState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainState::Start => "START",
            ChainState::TenantResolved => "TENANT_RESOLVED",
            ChainState::Unresolved => "UNRESOLVED",
            ChainState::GuardSelected => "GUARD_SELECTED",
            ChainState::BoundValidated => "BOUND_VALIDATED",
            ChainState::TenantMatchValidated => "TENANT_MATCH_VALIDATED",
            ChainState::Dispatched => "DISPATCHED",
            ChainState::Rejected401 => "REJECTED_401",
            ChainState::Rejected403 => "REJECTED_403",
        }
    }
}

fn transition(state: ChainState) {
    tracing::debug!(state = state.as_str(), "resolution chain");
}

/// Outcome of verifying the bearer token at request start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid(Claims),
    Invalid(TokenError),
}

impl TokenState {
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            TokenState::Valid(claims) => Some(claims),
            _ => None,
        }
    }
}

/// Per-request state built by [`ResolutionChain::begin`].
///
/// Owns the request's tenant context; dropping the scope returns storage to
/// the landlord connection.
#[derive(Debug)]
pub struct RequestScope {
    context: TenantContext,
    bearer: Option<String>,
    token: TokenState,
    source: ResolutionSource,
}

impl RequestScope {
    pub fn tenant(&self) -> Option<&Tenant> {
        self.context.current()
    }

    pub fn storage_scope(&self) -> StorageScope {
        self.context.storage_scope()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn token(&self) -> &TokenState {
        &self.token
    }

    pub fn source(&self) -> ResolutionSource {
        self.source
    }

    pub fn context(&self) -> &TenantContext {
        &self.context
    }
}

/// Internal reason for a 401. Logged, never returned to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingToken,
    InvalidToken(TokenError),
    BindingMismatch,
    UnknownPrincipal,
    InvalidCredentials,
}

impl core::fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UnauthorizedReason::MissingToken => f.write_str("missing_token"),
            UnauthorizedReason::InvalidToken(err) => write!(f, "invalid_token:{}", err.kind()),
            UnauthorizedReason::BindingMismatch => f.write_str("binding_mismatch"),
            UnauthorizedReason::UnknownPrincipal => f.write_str("unknown_principal"),
            UnauthorizedReason::InvalidCredentials => f.write_str("invalid_credentials"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Unauthorized(UnauthorizedReason),
    /// Identity proven, but the token belongs to another tenant.
    TenantMismatch,
    /// A collaborator failed (credential store down, signing error).
    Internal(String),
}

impl Rejection {
    pub fn state(&self) -> ChainState {
        match self {
            Rejection::TenantMismatch => ChainState::Rejected403,
            _ => ChainState::Rejected401,
        }
    }

    pub(crate) fn unauthorized(reason: UnauthorizedReason) -> Self {
        Rejection::Unauthorized(reason)
    }
}

impl From<TokenError> for Rejection {
    fn from(err: TokenError) -> Self {
        Rejection::Unauthorized(UnauthorizedReason::InvalidToken(err))
    }
}

/// A request that passed every check for one guard.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub guard: GuardName,
    pub principal: Principal,
    pub claims: Claims,
    pub token: String,
}

pub struct ResolutionChain {
    codec: Arc<TokenCodec>,
    directory: TenantDirectory,
    switch: Arc<dyn ConnectionSwitch>,
    registry: Arc<GuardRegistry>,
}

impl core::fmt::Debug for ResolutionChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResolutionChain")
            .field("codec", &self.codec)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ResolutionChain {
    pub fn new(
        codec: Arc<TokenCodec>,
        directory: TenantDirectory,
        switch: Arc<dyn ConnectionSwitch>,
        registry: Arc<GuardRegistry>,
    ) -> Self {
        Self {
            codec,
            directory,
            switch,
            registry,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn registry(&self) -> &GuardRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &TenantDirectory {
        &self.directory
    }

    pub async fn begin(&self, bearer: Option<String>, host: Option<&str>) -> RequestScope {
        self.begin_at(bearer, host, Utc::now()).await
    }

    /// Steps 1–2: verify the bearer token softly, resolve and activate a tenant.
    ///
    /// Never fails; a bad token or failed lookup leaves the request unscoped.
    pub async fn begin_at(
        &self,
        bearer: Option<String>,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> RequestScope {
        transition(ChainState::Start);

        let bearer = bearer.filter(|t| !t.trim().is_empty());
        let token = match bearer.as_deref() {
            None => TokenState::Absent,
            Some(raw) => match self.codec.verify_at(raw, now).await {
                Ok(claims) => TokenState::Valid(claims),
                Err(err) => {
                    tracing::warn!(kind = err.kind(), "bearer token rejected during tenant resolution");
                    TokenState::Invalid(err)
                }
            },
        };

        let resolution = self.directory.resolve(token.claims(), host).await;
        let mut context = TenantContext::new(self.switch.clone());
        let mut source = resolution.source;

        if let Some(tenant) = resolution.tenant {
            let tenant_id = tenant.id.clone();
            if let Err(err) = context.activate(tenant) {
                tracing::warn!(tenant_id = %tenant_id, error = %err, "tenant activation failed");
                source = ResolutionSource::Unresolved;
            }
        }

        transition(if context.current().is_some() {
            ChainState::TenantResolved
        } else {
            ChainState::Unresolved
        });

        RequestScope {
            context,
            bearer,
            token,
            source,
        }
    }

    /// Steps 3–7 for one guard.
    ///
    /// `tenant_scoped` enables the tenant-match check: when a tenant is active
    /// and the token carries a different `tenant_id`, the request is rejected
    /// with [`Rejection::TenantMismatch`]. A token without `tenant_id` passes.
    pub async fn authorize(
        &self,
        scope: &RequestScope,
        guard: GuardName,
        tenant_scoped: bool,
    ) -> Result<Authenticated, Rejection> {
        let result = self.authorize_inner(scope, guard, tenant_scoped).await;
        match &result {
            Ok(auth) => {
                transition(ChainState::Dispatched);
                tracing::debug!(guard = %auth.guard, sub = %auth.claims.sub, "request authenticated");
            }
            Err(rejection) => {
                transition(rejection.state());
                log_rejection(guard, rejection);
            }
        }
        result
    }

    /// Try each guard in the configured priority order; the first guard that
    /// authenticates wins. A tenant mismatch stops the search since identity
    /// was already proven for that guard.
    pub async fn authorize_any(&self, scope: &RequestScope) -> Result<Authenticated, Rejection> {
        let mut last = Rejection::Unauthorized(UnauthorizedReason::MissingToken);

        for guard in self.registry.by_priority() {
            match self.authorize_inner(scope, guard.name(), true).await {
                Ok(auth) => {
                    transition(ChainState::Dispatched);
                    return Ok(auth);
                }
                Err(Rejection::Unauthorized(reason)) => {
                    last = Rejection::Unauthorized(reason);
                }
                Err(other) => {
                    transition(other.state());
                    log_rejection(guard.name(), &other);
                    return Err(other);
                }
            }
        }

        transition(last.state());
        tracing::debug!(rejection = ?last, "no guard authenticated the request");
        Err(last)
    }

    async fn authorize_inner(
        &self,
        scope: &RequestScope,
        guard_name: GuardName,
        tenant_scoped: bool,
    ) -> Result<Authenticated, Rejection> {
        // Route guards are validated at startup, so an unknown name here is a
        // wiring bug; fail closed.
        let guard = self
            .registry
            .resolve(guard_name)
            .map_err(|_| Rejection::Unauthorized(UnauthorizedReason::BindingMismatch))?;
        transition(ChainState::GuardSelected);

        let (claims, token) = match (&scope.token, scope.bearer()) {
            (TokenState::Valid(claims), Some(token)) => (claims, token),
            (TokenState::Invalid(err), _) => return Err(err.clone().into()),
            _ => return Err(Rejection::Unauthorized(UnauthorizedReason::MissingToken)),
        };

        if !guard.binding_tag().matches(&claims.prv) {
            return Err(Rejection::Unauthorized(UnauthorizedReason::BindingMismatch));
        }
        transition(ChainState::BoundValidated);

        if tenant_scoped {
            check_tenant_match(scope.tenant(), claims.tenant_id.as_ref())?;
        }
        transition(ChainState::TenantMatchValidated);

        let principal = self.load_principal(guard, &scope.storage_scope(), claims).await?;

        Ok(Authenticated {
            guard: guard_name,
            principal,
            claims: claims.clone(),
            token: token.to_string(),
        })
    }

    pub(crate) async fn load_principal(
        &self,
        guard: &Guard,
        storage: &StorageScope,
        claims: &Claims,
    ) -> Result<Principal, Rejection> {
        match guard.provider().find_by_id(storage, &claims.sub).await {
            Ok(Some(principal)) if principal.kind == guard.principal_kind() => Ok(principal),
            Ok(_) => Err(Rejection::Unauthorized(UnauthorizedReason::UnknownPrincipal)),
            Err(CredentialError::InvalidCredentials) => {
                Err(Rejection::Unauthorized(UnauthorizedReason::UnknownPrincipal))
            }
            Err(CredentialError::Unavailable(msg)) => Err(Rejection::Internal(msg)),
        }
    }
}

/// Compare the token's tenant claim with the active tenant.
///
/// Passes when either side is absent; rejects only when both are present and
/// differ.
pub fn check_tenant_match(
    active: Option<&Tenant>,
    claimed: Option<&TenantId>,
) -> Result<(), Rejection> {
    let (Some(active), Some(claimed)) = (active, claimed) else {
        return Ok(());
    };
    if claimed.as_str().is_empty() {
        return Ok(());
    }

    let same: bool = active
        .id
        .as_str()
        .as_bytes()
        .ct_eq(claimed.as_str().as_bytes())
        .into();
    if same {
        Ok(())
    } else {
        Err(Rejection::TenantMismatch)
    }
}

pub(crate) fn log_rejection(guard: GuardName, rejection: &Rejection) {
    match rejection {
        Rejection::Unauthorized(reason) => {
            tracing::debug!(guard = %guard, reason = %reason, "request rejected");
        }
        Rejection::TenantMismatch => {
            tracing::info!(guard = %guard, "token not valid for the active tenant");
        }
        Rejection::Internal(msg) => {
            tracing::warn!(guard = %guard, error = %msg, "authentication failed internally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(id: &str) -> Tenant {
        Tenant::new(id.parse().unwrap(), format!("db_{id}")).unwrap()
    }

    #[test]
    fn tenant_match_rules() {
        let t1 = tenant("t1");
        let t1_id: TenantId = "t1".parse().unwrap();
        let t2_id: TenantId = "t2".parse().unwrap();

        assert_eq!(check_tenant_match(Some(&t1), Some(&t1_id)), Ok(()));
        assert_eq!(check_tenant_match(Some(&t1), Some(&t2_id)), Err(Rejection::TenantMismatch));
        assert_eq!(check_tenant_match(Some(&t1), None), Ok(()));
        assert_eq!(check_tenant_match(None, Some(&t2_id)), Ok(()));
        assert_eq!(check_tenant_match(None, None), Ok(()));
    }

    #[test]
    fn rejection_states() {
        assert_eq!(Rejection::TenantMismatch.state(), ChainState::Rejected403);
        assert_eq!(
            Rejection::from(TokenError::Expired).state(),
            ChainState::Rejected401
        );
        assert_eq!(
            UnauthorizedReason::InvalidToken(TokenError::Blacklisted).to_string(),
            "invalid_token:blacklisted"
        );
    }
}
