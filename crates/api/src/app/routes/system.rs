use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};

use tenantry_core::StorageScope;
use tenantry_tenancy::RequestScope;

use crate::app::dto::DebugDbResponse;
use crate::app::services::AppState;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Which storage the request is scoped to.
pub async fn debug_db(
    State(state): State<AppState>,
    Extension(scope): Extension<Arc<RequestScope>>,
) -> Json<DebugDbResponse> {
    let (connection, database) = match scope.storage_scope() {
        StorageScope::Landlord => ("landlord", state.landlord_database.to_string()),
        StorageScope::Tenant { database_ref, .. } => ("tenant", database_ref),
    };
    Json(DebugDbResponse {
        status: "success",
        connection,
        database,
    })
}
