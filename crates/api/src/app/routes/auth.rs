//! Login, refresh, logout and `me` endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Extension, Json, Router,
};

use tenantry_auth::{GuardName, Principal};
use tenantry_tenancy::RequestScope;

use crate::app::dto::{LoginRequest, MessageResponse, TokenResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/landlord/login", post(landlord_login))
        .route("/tenant/login", post(tenant_login))
        .route("/login", post(user_login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

pub async fn landlord_login(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<RequestScope>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    login(&state, &scope, GuardName::Landlord, body).await
}

pub async fn tenant_login(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<RequestScope>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    login(&state, &scope, GuardName::Tenant, body).await
}

pub async fn user_login(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<RequestScope>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    login(&state, &scope, GuardName::Api, body).await
}

async fn login(
    state: &AppState,
    scope: &RequestScope,
    guard: GuardName,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidBody("email and password are required".into()));
    }

    let issued = state.chain.login(scope, guard, &req.email, &req.password).await?;
    Ok(Json(issued.into()))
}

pub async fn refresh(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<RequestScope>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (_, issued) = state.chain.refresh(&scope).await?;
    Ok(Json(issued.into()))
}

/// Always succeeds; a request with no usable token simply has nothing to
/// invalidate.
pub async fn logout(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<RequestScope>>,
) -> Json<MessageResponse> {
    state.chain.logout(&scope).await;
    Json(MessageResponse {
        message: "Successfully logged out",
    })
}

pub async fn me(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<RequestScope>>,
) -> Result<Json<Principal>, ApiError> {
    let (_, principal) = state.chain.me(&scope).await?;
    Ok(Json(principal))
}
