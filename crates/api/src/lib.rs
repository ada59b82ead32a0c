//! HTTP API: tenancy middleware, guarded routes and auth endpoints.

pub mod app;
pub mod config;
pub mod middleware;
