//! Sign-up, sign-in, sign-out, token refresh and password flows.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use reservo_auth::{Credentials, PasswordResetToken, SessionContext};
use reservo_core::{DomainError, DomainResult};
use reservo_marketplace::User;

use super::{StatusOutput, hash_password, verify_password};
use crate::deps::AppDeps;
use crate::mailer::{Email, send_detached};

pub mod events {
    pub const SIGNED_UP: &str = "auth.signed_up";
    pub const SIGNED_IN: &str = "auth.signed_in";
    pub const SIGNED_OUT: &str = "auth.signed_out";
    pub const TOKENS_REFRESHED: &str = "auth.tokens_refreshed";
    pub const PASSWORD_RESET: &str = "auth.password_reset";
    pub const PASSWORD_CHANGED: &str = "auth.password_changed";
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordInput {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
}

/// Forgot-password response; the token is only exposed in test mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordOutput {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

pub async fn sign_up(deps: &AppDeps, input: SignUpInput) -> DomainResult<Credentials<User>> {
    debug!(email = %input.email, "sign up requested");

    {
        let mut tx = deps.store.begin().await?;
        if tx.find_user_by_email(&input.email).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "user with email: {} already registered",
                input.email
            )));
        }
    }

    let password_hash = hash_password(deps, &input.password).await?;

    let mut tx = deps.store.begin().await?;
    let user = tx
        .insert_user(User::new(
            input.email,
            input.first_name,
            input.last_name,
            password_hash,
            deps.clock.now(),
        ))
        .await?;
    let credentials = deps.tokens.issue(&mut *tx, user).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::SIGNED_UP, json!({ "user": credentials.user }))
        .await;

    info!(user_id = %credentials.user.id, "user signed up");
    Ok(credentials)
}

pub async fn sign_in(deps: &AppDeps, input: SignInInput) -> DomainResult<Credentials<User>> {
    debug!(email = %input.email, "sign in attempt");

    let user = {
        let mut tx = deps.store.begin().await?;
        tx.find_user_by_email(&input.email).await?
    };
    let Some(user) = user else {
        return Err(DomainError::not_found(format!("user with email: {} not found", input.email)));
    };

    if !verify_password(deps, &input.password, &user.password_hash).await? {
        return Err(DomainError::unauthorized("invalid password"));
    }

    let mut tx = deps.store.begin().await?;
    let credentials = deps.tokens.issue(&mut *tx, user).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::SIGNED_IN, json!({ "user": credentials.user }))
        .await;

    info!(user_id = %credentials.user.id, "user signed in");
    Ok(credentials)
}

/// Revoke the refresh-token lineage bound to `ctx`.
pub async fn sign_out(deps: &AppDeps, ctx: &SessionContext) -> DomainResult<StatusOutput> {
    let credentials = ctx.credentials()?;
    let user_id = credentials.user_id;
    debug!(user_id = %user_id, "signing out");

    let mut tx = deps.store.begin().await?;
    let deleted = deps.tokens.rotate(&mut *tx, &credentials.ppid, user_id).await?;
    if deleted == 0 {
        return Err(DomainError::unauthorized("failed to sign out"));
    }
    tx.commit().await?;

    deps.bus
        .publish(events::SIGNED_OUT, json!({ "userId": user_id }))
        .await;

    info!(user_id = %user_id, "user signed out");
    Ok(StatusOutput::SUCCESS)
}

/// Rotate the refresh token bound to `ctx` into a fresh pair.
///
/// Of concurrent refreshes with the same token exactly one succeeds; the rest
/// find nothing to delete and are rejected.
pub async fn refresh_tokens(deps: &AppDeps, ctx: &SessionContext) -> DomainResult<Credentials<User>> {
    let credentials = ctx.credentials()?;
    let user_id = credentials.user_id;
    debug!(user_id = %user_id, "refreshing tokens");

    let mut tx = deps.store.begin().await?;
    let Some(user) = tx.find_user(user_id).await? else {
        return Err(DomainError::not_found("user not found"));
    };

    let deleted = deps.tokens.rotate(&mut *tx, &credentials.ppid, user_id).await?;
    if deleted == 0 {
        return Err(DomainError::unauthorized("failed to refresh tokens"));
    }

    let fresh = deps.tokens.issue(&mut *tx, user).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::TOKENS_REFRESHED, json!({ "userId": user_id }))
        .await;

    info!(user_id = %user_id, "tokens refreshed");
    Ok(fresh)
}

/// Always succeeds for unknown emails so callers cannot probe for accounts.
pub async fn forgot_password(deps: &AppDeps, input: ForgotPasswordInput) -> DomainResult<ForgotPasswordOutput> {
    debug!(email = %input.email, "password reset requested");

    let mut tx = deps.store.begin().await?;
    let Some(user) = tx.find_user_by_email(&input.email).await? else {
        debug!(email = %input.email, "no user for password reset; returning success");
        return Ok(ForgotPasswordOutput {
            status: true,
            reset_token: None,
        });
    };

    let reset_token = deps.random.secret();
    tx.create_reset_token(PasswordResetToken::new(
        user.email.clone(),
        reset_token.clone(),
        deps.clock.now(),
        deps.config.password_reset_ttl,
    ))
    .await?;
    tx.commit().await?;

    let reset_url = format!(
        "{}/auth/reset-password?token={reset_token}",
        deps.config.application_url
    );
    send_detached(
        deps.mailer.clone(),
        Email::PasswordReset {
            to: user.email.clone(),
            reset_token: reset_token.clone(),
            reset_url,
        },
    );

    info!(user_id = %user.id, "password reset email queued");
    Ok(ForgotPasswordOutput {
        status: true,
        reset_token: deps.config.is_test.then_some(reset_token),
    })
}

/// Consume a reset token and set a new password.
///
/// The token is marked used in the same unit of work as the password update.
/// Every other outstanding reset token for the email and every refresh token
/// of the user are revoked with it.
pub async fn reset_password(deps: &AppDeps, input: ResetPasswordInput) -> DomainResult<StatusOutput> {
    debug!("password reset attempt");

    let (token_id, email, user_id) = {
        let mut tx = deps.store.begin().await?;
        let Some(token) = tx.find_reset_token(&input.token).await? else {
            return Err(DomainError::unauthorized("invalid or already used reset token"));
        };
        if token.is_used() {
            return Err(DomainError::unauthorized("invalid or already used reset token"));
        }
        if !token.is_valid_at(deps.clock.now()) {
            return Err(DomainError::unauthorized("reset token has expired"));
        }
        let Some(user) = tx.find_user_by_email(&token.email).await? else {
            return Err(DomainError::not_found("user not found"));
        };
        (token.id, token.email, user.id)
    };

    let password_hash = hash_password(deps, &input.password).await?;
    let now = deps.clock.now();

    let mut tx = deps.store.begin().await?;
    if !tx.mark_reset_token_used(token_id, now).await? {
        return Err(DomainError::unauthorized("invalid or already used reset token"));
    }
    tx.invalidate_reset_tokens(&email, now).await?;
    let Some(mut user) = tx.find_user(user_id).await? else {
        return Err(DomainError::not_found("user not found"));
    };
    user.password_hash = password_hash;
    user.updated_at = now;
    tx.update_user(&user).await?;
    deps.tokens.revoke_all(&mut *tx, user_id).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::PASSWORD_RESET, json!({ "userId": user_id }))
        .await;

    info!(user_id = %user_id, "password reset");
    Ok(StatusOutput::SUCCESS)
}

pub async fn change_password(
    deps: &AppDeps,
    ctx: &SessionContext,
    input: ChangePasswordInput,
) -> DomainResult<StatusOutput> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, "password change requested");

    let user = {
        let mut tx = deps.store.begin().await?;
        tx.find_user(user_id).await?
    };
    let Some(user) = user else {
        return Err(DomainError::not_found("user not found"));
    };

    if !verify_password(deps, &input.old_password, &user.password_hash).await? {
        return Err(DomainError::unauthorized("current password is incorrect"));
    }
    if verify_password(deps, &input.new_password, &user.password_hash).await? {
        return Err(DomainError::bad_request(
            "new password must be different from current password",
        ));
    }

    let password_hash = hash_password(deps, &input.new_password).await?;

    let mut tx = deps.store.begin().await?;
    let Some(mut user) = tx.find_user(user_id).await? else {
        return Err(DomainError::not_found("user not found"));
    };
    user.password_hash = password_hash;
    user.updated_at = deps.clock.now();
    tx.update_user(&user).await?;
    deps.tokens.revoke_all(&mut *tx, user_id).await?;
    tx.commit().await?;

    send_detached(
        deps.mailer.clone(),
        Email::PasswordChanged {
            to: user.email.clone(),
        },
    );
    deps.bus
        .publish(events::PASSWORD_CHANGED, json!({ "user": user }))
        .await;

    info!(user_id = %user_id, "password changed");
    Ok(StatusOutput::SUCCESS)
}
