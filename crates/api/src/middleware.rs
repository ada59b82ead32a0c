use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use tenantry_auth::GuardName;
use tenantry_tenancy::RequestScope;

use crate::app::errors::ApiError;
use crate::app::services::AppState;

/// Runs on every `/api` request: verifies the bearer token softly, resolves
/// and activates the tenant, and stores the [`RequestScope`] in the request
/// extensions. Never rejects.
pub async fn tenancy_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let bearer = extract_bearer(req.headers()).map(str::to_string);
    let host = request_host(&req);

    let scope = Arc::new(state.chain.begin(bearer, host.as_deref()).await);
    req.extensions_mut().insert(scope.clone());

    let response = next.run(req).await;

    // The handler's copy is gone once the response exists; dropping the last
    // one here returns storage to the landlord connection.
    drop(scope);
    response
}

/// Guard declared on a route group.
#[derive(Debug, Copy, Clone)]
pub struct RouteGuard {
    pub guard: GuardName,
    /// Reject tokens issued for a tenant other than the active one.
    pub tenant_scoped: bool,
}

#[derive(Clone)]
pub struct GuardState {
    pub app: AppState,
    pub route: RouteGuard,
}

/// Authenticate the request against one guard and attach the result.
pub async fn guard_middleware(
    State(state): State<GuardState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let scope = req
        .extensions()
        .get::<Arc<RequestScope>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("guarded route without tenancy middleware".into()))?;

    let auth = state
        .app
        .chain
        .authorize(&scope, state.route.guard, state.route.tenant_scoped)
        .await?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Token from `Authorization: Bearer <token>`; anything else counts as absent.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Host the client addressed: the `Host` header, else the URI authority.
pub fn request_host(req: &Request) -> Option<String> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("bearer  tok ")), Some("tok"));
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(extract_bearer(&headers("Bearer ")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn host_prefers_header() {
        let req = axum::http::Request::builder()
            .uri("http://from-uri.test/api")
            .header(header::HOST, "acme.localhost:8080")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(request_host(&req).as_deref(), Some("acme.localhost:8080"));

        let req = axum::http::Request::builder()
            .uri("http://from-uri.test/api")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(request_host(&req).as_deref(), Some("from-uri.test"));
    }
}
