//! Binding verified tokens to a request's session context.

use reservo_auth::SessionContext;
use reservo_core::DomainResult;

use crate::deps::AppDeps;

/// Verify an access token and return a context with identity bound.
pub fn authenticate_access(deps: &AppDeps, token: &str) -> DomainResult<SessionContext> {
    let identity = deps.tokens.authenticate_access(token)?;
    Ok(SessionContext::with_identity(identity))
}

/// Verify a refresh token against its stored record and return a context with
/// credentials bound.
///
/// A record that is gone (rotated, logged out, revoked) is `Unauthorized`.
pub async fn authenticate_refresh(deps: &AppDeps, token: &str) -> DomainResult<SessionContext> {
    let mut tx = deps.store.begin().await?;
    let credentials = deps.tokens.authenticate_refresh(&mut *tx, token).await?;
    drop(tx);

    Ok(SessionContext::with_credentials(credentials))
}
