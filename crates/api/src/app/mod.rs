//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend selection and the shared resolution chain
//! - `routes/`: HTTP handlers (auth, guarded routes, system)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use anyhow::Context;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower::ServiceBuilder;

use tenantry_auth::GuardName;
use tenantry_infra::InMemoryBackend;

use crate::config::AppConfig;
use crate::middleware::{self, GuardState, RouteGuard};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::{AppState, Backends};

/// Build the full HTTP router from configuration (entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<(Router, AppState)> {
    let state = services::build_state(config).await?;
    let app = router(state.clone())?;
    Ok((app, state))
}

/// Router over an existing in-memory backend; the caller keeps the handle to
/// seed and inspect it.
pub fn build_in_memory_app(config: &AppConfig, backend: &InMemoryBackend) -> anyhow::Result<Router> {
    let state = services::assemble(config, Backends::in_memory(backend, config))?;
    router(state)
}

pub fn router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .nest("/auth", routes::auth::router())
        .nest(
            "/landlord",
            guarded(&state, GuardName::Landlord, routes::protected::landlord_router())?,
        )
        .nest(
            "/tenant",
            guarded(&state, GuardName::Tenant, routes::protected::tenant_router())?,
        )
        .nest("/user", guarded(&state, GuardName::Api, routes::protected::user_router())?)
        .route("/debug-db", get(routes::system::debug_db))
        .layer(from_fn_with_state(state.clone(), middleware::tenancy_middleware));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new())
        .with_state(state))
}

/// Put a route group behind one guard. A guard missing from the registry is
/// a startup error.
fn guarded(
    state: &AppState,
    guard: GuardName,
    routes: Router<AppState>,
) -> anyhow::Result<Router<AppState>> {
    state
        .chain
        .registry()
        .resolve(guard)
        .with_context(|| format!("route group requires guard '{guard}'"))?;

    let guard_state = GuardState {
        app: state.clone(),
        route: RouteGuard {
            guard,
            tenant_scoped: true,
        },
    };
    Ok(routes.route_layer(from_fn_with_state(guard_state, middleware::guard_middleware)))
}
