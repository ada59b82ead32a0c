//! Login, refresh, logout and "me" on top of the resolution chain.

use chrono::{DateTime, Utc};

use tenantry_auth::{
    CredentialError, ExtraClaims, GuardName, IssuedToken, Principal, TokenError,
};

use crate::chain::{
    check_tenant_match, log_rejection, Rejection, RequestScope, ResolutionChain,
    UnauthorizedReason,
};

impl ResolutionChain {
    /// Check credentials with the guard's provider, in the request's storage
    /// scope, and issue a token bound to that guard.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(
        &self,
        scope: &RequestScope,
        guard_name: GuardName,
        email: &str,
        password: &str,
    ) -> Result<IssuedToken, Rejection> {
        let guard = self
            .registry()
            .resolve(guard_name)
            .map_err(|err| Rejection::Internal(err.to_string()))?;

        let principal = match guard.provider().verify(&scope.storage_scope(), email, password).await {
            Ok(principal) => principal,
            Err(CredentialError::InvalidCredentials) => {
                let rejection = Rejection::unauthorized(UnauthorizedReason::InvalidCredentials);
                log_rejection(guard_name, &rejection);
                return Err(rejection);
            }
            Err(CredentialError::Unavailable(msg)) => {
                let rejection = Rejection::Internal(msg);
                log_rejection(guard_name, &rejection);
                return Err(rejection);
            }
        };

        let extra = match &principal.tenant_id {
            Some(tenant_id) => ExtraClaims::tenant(tenant_id.clone()),
            None => ExtraClaims::none(),
        };

        let issued = self
            .codec()
            .issue(&principal.id, &guard.token_profile(), extra)
            .map_err(|err| Rejection::Internal(err.to_string()))?;

        tracing::info!(guard = %guard_name, sub = %principal.id, "login succeeded");
        Ok(issued)
    }

    pub async fn refresh(&self, scope: &RequestScope) -> Result<(GuardName, IssuedToken), Rejection> {
        self.refresh_at(scope, Utc::now()).await
    }

    /// Reissue the request's bearer token.
    ///
    /// The guard is the first one in priority order whose binding tag the token
    /// carries. The token may be expired as long as it is inside the refresh
    /// grace window.
    pub async fn refresh_at(
        &self,
        scope: &RequestScope,
        now: DateTime<Utc>,
    ) -> Result<(GuardName, IssuedToken), Rejection> {
        let token = scope
            .bearer()
            .ok_or(Rejection::unauthorized(UnauthorizedReason::MissingToken))?;
        let claims = self.codec().inspect(token)?;

        let guard = self
            .registry()
            .by_priority()
            .find(|g| g.binding_tag().matches(&claims.prv))
            .ok_or(Rejection::unauthorized(UnauthorizedReason::BindingMismatch))?;

        if let Err(rejection) = check_tenant_match(scope.tenant(), claims.tenant_id.as_ref()) {
            log_rejection(guard.name(), &rejection);
            return Err(rejection);
        }
        self.load_principal(guard, &scope.storage_scope(), &claims).await?;

        let issued = self.codec().refresh_at(token, now).await.map_err(|err| match err {
            TokenError::Encoding(msg) | TokenError::Revocation(msg) => {
                tracing::error!(guard = %guard.name(), error = %msg, "token refresh failed");
                Rejection::Internal(msg)
            }
            other => Rejection::from(other),
        })?;

        tracing::info!(guard = %guard.name(), sub = %issued.claims.sub, "token refreshed");
        Ok((guard.name(), issued))
    }

    /// Invalidate the bearer token of whichever guard authenticates it.
    ///
    /// Returns the guard that was logged out, if any. Logging out without a
    /// usable token is not an error. A revocation store failure is logged and
    /// also yields `None`: the token stays valid until it expires.
    pub async fn logout(&self, scope: &RequestScope) -> Option<GuardName> {
        let auth = self.authorize_any(scope).await.ok()?;
        if let Err(err) = self.codec().invalidate(&auth.token).await {
            tracing::error!(
                guard = %auth.guard,
                sub = %auth.claims.sub,
                kind = err.kind(),
                error = %err,
                "logout could not invalidate token"
            );
            return None;
        }
        tracing::info!(guard = %auth.guard, sub = %auth.claims.sub, "logged out");
        Some(auth.guard)
    }

    /// Principal of the first guard that authenticates the request.
    pub async fn me(&self, scope: &RequestScope) -> Result<(GuardName, Principal), Rejection> {
        self.authorize_any(scope)
            .await
            .map(|auth| (auth.guard, auth.principal))
    }
}
