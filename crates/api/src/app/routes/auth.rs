use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};

use reservo_auth::SessionContext;
use reservo_infra::AppDeps;
use reservo_infra::mutations::auth::{
    self, ChangePasswordInput, ForgotPasswordInput, ResetPasswordInput, SignInInput, SignUpInput,
};

use crate::app::errors;
use crate::middleware;

/// `/v1/auth` routes.
///
/// Sign-out and refresh authenticate with the refresh token; password change
/// with the access token; the rest are public.
pub fn router(deps: AppDeps) -> Router {
    let with_refresh = Router::new()
        .route("/log-out", post(sign_out))
        .route("/refresh-tokens", put(refresh_tokens))
        .layer(axum::middleware::from_fn_with_state(
            deps.clone(),
            middleware::refresh_middleware,
        ));

    let with_access = Router::new()
        .route("/change-password", post(change_password))
        .layer(axum::middleware::from_fn_with_state(
            deps,
            middleware::access_middleware,
        ));

    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .merge(with_refresh)
        .merge(with_access)
}

pub async fn sign_up(
    Extension(deps): Extension<AppDeps>,
    Json(body): Json<SignUpInput>,
) -> axum::response::Response {
    match auth::sign_up(&deps, body).await {
        Ok(credentials) => (StatusCode::CREATED, Json(credentials)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn sign_in(
    Extension(deps): Extension<AppDeps>,
    Json(body): Json<SignInInput>,
) -> axum::response::Response {
    match auth::sign_in(&deps, body).await {
        Ok(credentials) => Json(credentials).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn sign_out(
    Extension(deps): Extension<AppDeps>,
    Extension(ctx): Extension<Arc<SessionContext>>,
) -> axum::response::Response {
    match auth::sign_out(&deps, &ctx).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn refresh_tokens(
    Extension(deps): Extension<AppDeps>,
    Extension(ctx): Extension<Arc<SessionContext>>,
) -> axum::response::Response {
    match auth::refresh_tokens(&deps, &ctx).await {
        Ok(credentials) => Json(credentials).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn forgot_password(
    Extension(deps): Extension<AppDeps>,
    Json(body): Json<ForgotPasswordInput>,
) -> axum::response::Response {
    match auth::forgot_password(&deps, body).await {
        Ok(out) => Json(out).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn reset_password(
    Extension(deps): Extension<AppDeps>,
    Json(body): Json<ResetPasswordInput>,
) -> axum::response::Response {
    match auth::reset_password(&deps, body).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn change_password(
    Extension(deps): Extension<AppDeps>,
    Extension(ctx): Extension<Arc<SessionContext>>,
    Json(body): Json<ChangePasswordInput>,
) -> axum::response::Response {
    match auth::change_password(&deps, &ctx, body).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
