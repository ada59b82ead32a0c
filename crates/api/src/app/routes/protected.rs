//! Guarded route groups. Each router is mounted behind its guard's layer,
//! which attaches the [`Authenticated`] result.

use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};

use tenantry_auth::Principal;
use tenantry_tenancy::{Authenticated, RequestScope};

use crate::app::dto::{TenantContextResponse, UserEmailResponse};
use crate::app::services::AppState;

pub fn landlord_router() -> Router<AppState> {
    Router::new().route("/protected", get(protected))
}

pub fn tenant_router() -> Router<AppState> {
    Router::new()
        .route("/protected", get(protected))
        .route("/check-context", get(check_context))
}

pub fn user_router() -> Router<AppState> {
    Router::new()
        .route("/", get(current_user))
        .route("/protected", get(protected))
}

pub async fn protected(Extension(auth): Extension<Authenticated>) -> Json<UserEmailResponse> {
    Json(UserEmailResponse {
        user: auth.principal.email,
    })
}

pub async fn check_context(Extension(scope): Extension<Arc<RequestScope>>) -> Json<TenantContextResponse> {
    Json(TenantContextResponse {
        tenant_id: scope.tenant().map(|t| t.id.clone()),
    })
}

pub async fn current_user(Extension(auth): Extension<Authenticated>) -> Json<Principal> {
    Json(auth.principal)
}
