//! Per-request session context.
//!
//! One `SessionContext` is created per inbound request and handed explicitly
//! to the orchestrators. It has two independent, write-once slots:
//!
//! - identity: bound after access-token verification
//! - credentials: bound after refresh-token verification (refresh/logout only)
//!
//! Reading an unbound slot is `Unauthorized`, so authenticated code never has
//! to null-check the current user.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use reservo_core::{DomainError, DomainResult, RefreshTokenId, UserId};

/// Authenticated principal of the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub refresh_token_id: RefreshTokenId,
}

/// Refresh-token credentials of the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    pub ppid: String,
    pub refresh_token_id: RefreshTokenId,
    pub user_id: UserId,
}

#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    identity: OnceLock<SessionIdentity>,
    credentials: OnceLock<SessionCredentials>,
}

impl SessionContext {
    /// An anonymous context (both slots unbound).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: SessionIdentity) -> Self {
        let ctx = Self::new();
        let _ = ctx.identity.set(identity);
        ctx
    }

    pub fn with_credentials(credentials: SessionCredentials) -> Self {
        let ctx = Self::new();
        let _ = ctx.credentials.set(credentials);
        ctx
    }

    /// Bind the identity slot. Binding twice is an internal error.
    pub fn set_identity(&self, identity: SessionIdentity) -> DomainResult<()> {
        self.identity
            .set(identity)
            .map_err(|_| DomainError::internal("session identity already bound"))
    }

    pub fn identity(&self) -> DomainResult<&SessionIdentity> {
        self.identity
            .get()
            .ok_or_else(|| DomainError::unauthorized("no authenticated user in session"))
    }

    /// Shorthand for `identity()?.user_id`.
    pub fn user_id(&self) -> DomainResult<UserId> {
        self.identity().map(|identity| identity.user_id)
    }

    /// Bind the credentials slot. Binding twice is an internal error.
    pub fn set_credentials(&self, credentials: SessionCredentials) -> DomainResult<()> {
        self.credentials
            .set(credentials)
            .map_err(|_| DomainError::internal("session credentials already bound"))
    }

    pub fn credentials(&self) -> DomainResult<&SessionCredentials> {
        self.credentials
            .get()
            .ok_or_else(|| DomainError::unauthorized("user credentials not found in session"))
    }
}
