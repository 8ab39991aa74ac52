//! HTTP API application wiring.
//!
//! - `routes/`: HTTP handlers (one file per area)
//! - `errors.rs`: `DomainError` to JSON error responses

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use reservo_infra::AppDeps;

pub mod errors;
pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Handlers must already be registered on `deps.bus`.
pub fn build_app(deps: AppDeps) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1/auth", routes::auth::router(deps.clone()))
        .layer(ServiceBuilder::new().layer(Extension(deps)))
}
