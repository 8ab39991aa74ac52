use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use reservo_infra::AppDeps;
use reservo_infra::session;

use crate::app::errors::{domain_error_to_response, json_error};

/// Verifies the bearer access token and binds the session identity.
pub async fn access_middleware(
    State(deps): State<AppDeps>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())?;
    let ctx = session::authenticate_access(&deps, token).map_err(domain_error_to_response)?;

    req.extensions_mut().insert(Arc::new(ctx));
    Ok(next.run(req).await)
}

/// Verifies the bearer refresh token against its stored record and binds the
/// session credentials.
pub async fn refresh_middleware(
    State(deps): State<AppDeps>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())?.to_string();
    let ctx = session::authenticate_refresh(&deps, &token)
        .await
        .map_err(domain_error_to_response)?;

    req.extensions_mut().insert(Arc::new(ctx));
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let unauthorized = || json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing bearer token");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(unauthorized)?;

    let header = header.to_str().map_err(|_| unauthorized())?;

    let header = header.strip_prefix("Bearer ").ok_or_else(unauthorized)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(unauthorized());
    }

    Ok(token)
}
