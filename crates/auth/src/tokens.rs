//! Token lifecycle: issuance, rotation and revocation of access/refresh pairs.
//!
//! ## Refresh-token lineage
//!
//! ```text
//! issue ──> ISSUED(id₁) ──refresh: rotate deletes id₁, issue creates id₂──> ISSUED(id₂) ...
//!              │
//!              └──logout / password change──> REVOKED (row deleted)
//! ```
//!
//! Deletion is the only revocation mechanism. A refresh token whose record is
//! gone is rejected as `Unauthorized`, and the delete count returned by
//! [`TokenLifecycleService::rotate`] is the replay-detection point: of two
//! concurrent refreshes with the same token, exactly one sees a deleted row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use reservo_core::{Clock, DomainError, DomainResult, RefreshTokenId, UserId};

use crate::claims::{AccessClaims, RefreshClaims};
use crate::random::RandomSource;
use crate::session::{SessionCredentials, SessionIdentity};
use crate::signer::TokenSigner;

/// One row per live refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    pub id: RefreshTokenId,
    pub ppid: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Store operations on refresh-token records.
///
/// Implemented by store transactions; `&mut self` keeps every call inside the
/// caller's unit-of-work.
#[async_trait]
pub trait RefreshTokenRepository: Send {
    async fn create_refresh_token(&mut self, record: RefreshTokenRecord) -> DomainResult<()>;

    async fn find_refresh_token(&mut self, id: RefreshTokenId) -> DomainResult<Option<RefreshTokenRecord>>;

    /// Delete the records matching `(ppid, user_id)`; returns rows affected.
    async fn delete_refresh_tokens(&mut self, ppid: &str, user_id: UserId) -> DomainResult<u64>;

    /// Delete every record of `user_id`; returns rows affected.
    async fn delete_user_refresh_tokens(&mut self, user_id: UserId) -> DomainResult<u64>;
}

/// Anything tokens can be issued for.
pub trait TokenSubject {
    fn subject_id(&self) -> UserId;
}

/// Freshly issued token pair. Handed to the caller once, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials<U> {
    pub access_token: String,
    pub refresh_token: String,
    pub user: U,
}

pub struct TokenLifecycleService {
    access: Arc<dyn TokenSigner<AccessClaims>>,
    refresh: Arc<dyn TokenSigner<RefreshClaims>>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for TokenLifecycleService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenLifecycleService")
            .field("access_expires_in", &self.access.expires_in())
            .field("refresh_expires_in", &self.refresh.expires_in())
            .finish_non_exhaustive()
    }
}

impl TokenLifecycleService {
    /// `clock` stamps `iat`/`exp`; signers verify expiry against wall time, so
    /// production wiring passes the system clock.
    pub fn new(
        access: Arc<dyn TokenSigner<AccessClaims>>,
        refresh: Arc<dyn TokenSigner<RefreshClaims>>,
        random: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            access,
            refresh,
            random,
            clock,
        }
    }

    /// Sign a fresh access/refresh pair for `user` and persist its record.
    ///
    /// The only path that creates a [`RefreshTokenRecord`].
    pub async fn issue<U, R>(&self, repo: &mut R, user: U) -> DomainResult<Credentials<U>>
    where
        U: TokenSubject,
        R: RefreshTokenRepository + ?Sized,
    {
        let user_id = user.subject_id();
        let refresh_token_id = RefreshTokenId::from_uuid(self.random.uuid());
        let ppid = self.random.secret();
        let now = self.clock.now();

        let access_token = self.access.sign(&AccessClaims {
            user_id,
            refresh_token_id,
            iat: now.timestamp(),
            exp: expiry(now, self.access.expires_in())?,
        })?;

        let refresh_token = self.refresh.sign(&RefreshClaims {
            user_id,
            refresh_token_id,
            ppid: ppid.clone(),
            iat: now.timestamp(),
            exp: expiry(now, self.refresh.expires_in())?,
        })?;

        repo.create_refresh_token(RefreshTokenRecord {
            id: refresh_token_id,
            ppid,
            user_id,
            created_at: now,
        })
        .await?;

        debug!(user_id = %user_id, refresh_token_id = %refresh_token_id, "tokens issued");

        Ok(Credentials {
            access_token,
            refresh_token,
            user,
        })
    }

    /// Delete the lineage identified by `(ppid, user_id)`.
    ///
    /// Returns rows affected. Zero means the refresh token was already used,
    /// revoked or forged; callers must reject with `Unauthorized`.
    pub async fn rotate<R>(&self, repo: &mut R, ppid: &str, user_id: UserId) -> DomainResult<u64>
    where
        R: RefreshTokenRepository + ?Sized,
    {
        let deleted = repo.delete_refresh_tokens(ppid, user_id).await?;
        debug!(user_id = %user_id, deleted, "refresh token rotated");
        Ok(deleted)
    }

    /// Revoke every refresh token of `user_id` (password change/reset).
    pub async fn revoke_all<R>(&self, repo: &mut R, user_id: UserId) -> DomainResult<u64>
    where
        R: RefreshTokenRepository + ?Sized,
    {
        let deleted = repo.delete_user_refresh_tokens(user_id).await?;
        debug!(user_id = %user_id, deleted, "refresh tokens revoked");
        Ok(deleted)
    }

    /// Verify an access token into a session identity.
    pub fn authenticate_access(&self, token: &str) -> DomainResult<SessionIdentity> {
        let claims = self.access.verify(token)?;
        Ok(SessionIdentity {
            user_id: claims.user_id,
            refresh_token_id: claims.refresh_token_id,
        })
    }

    /// Verify a refresh token and cross-check it against its persisted record.
    pub async fn authenticate_refresh<R>(&self, repo: &mut R, token: &str) -> DomainResult<SessionCredentials>
    where
        R: RefreshTokenRepository + ?Sized,
    {
        let claims = self.refresh.verify(token)?;

        let Some(record) = repo.find_refresh_token(claims.refresh_token_id).await? else {
            debug!(refresh_token_id = %claims.refresh_token_id, "refresh token record absent");
            return Err(DomainError::unauthorized("refresh token revoked"));
        };

        let ppid_matches: bool = record.ppid.as_bytes().ct_eq(claims.ppid.as_bytes()).into();
        if !ppid_matches || record.user_id != claims.user_id {
            return Err(DomainError::unauthorized("refresh token does not match its record"));
        }

        Ok(SessionCredentials {
            ppid: claims.ppid,
            refresh_token_id: claims.refresh_token_id,
            user_id: claims.user_id,
        })
    }
}

fn expiry(now: DateTime<Utc>, ttl: chrono::Duration) -> DomainResult<i64> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| DomainError::internal("token expiry out of range"))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use reservo_core::SystemClock;

    use super::*;
    use crate::random::OsRandom;
    use crate::signer::Hs256Signer;

    #[derive(Default)]
    struct Rows(Vec<RefreshTokenRecord>);

    #[async_trait]
    impl RefreshTokenRepository for Rows {
        async fn create_refresh_token(&mut self, record: RefreshTokenRecord) -> DomainResult<()> {
            self.0.push(record);
            Ok(())
        }

        async fn find_refresh_token(&mut self, id: RefreshTokenId) -> DomainResult<Option<RefreshTokenRecord>> {
            Ok(self.0.iter().find(|r| r.id == id).cloned())
        }

        async fn delete_refresh_tokens(&mut self, ppid: &str, user_id: UserId) -> DomainResult<u64> {
            let before = self.0.len();
            self.0.retain(|r| !(r.ppid == ppid && r.user_id == user_id));
            Ok((before - self.0.len()) as u64)
        }

        async fn delete_user_refresh_tokens(&mut self, user_id: UserId) -> DomainResult<u64> {
            let before = self.0.len();
            self.0.retain(|r| r.user_id != user_id);
            Ok((before - self.0.len()) as u64)
        }
    }

    struct Subject(UserId);

    impl TokenSubject for Subject {
        fn subject_id(&self) -> UserId {
            self.0
        }
    }

    fn service() -> TokenLifecycleService {
        TokenLifecycleService::new(
            Arc::new(Hs256Signer::new("access", "access-secret", Duration::minutes(15))),
            Arc::new(Hs256Signer::new("refresh", "refresh-secret", Duration::days(30))),
            Arc::new(OsRandom),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn issued_refresh_token_matches_its_record() {
        let svc = service();
        let mut rows = Rows::default();
        let user_id = UserId::new();

        let creds = svc.issue(&mut rows, Subject(user_id)).await.unwrap();

        assert!(!creds.access_token.is_empty());
        assert!(!creds.refresh_token.is_empty());
        assert_eq!(rows.0.len(), 1);

        let session = svc.authenticate_refresh(&mut rows, &creds.refresh_token).await.unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.refresh_token_id, rows.0[0].id);
        assert_eq!(session.ppid, rows.0[0].ppid);

        let identity = svc.authenticate_access(&creds.access_token).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.refresh_token_id, session.refresh_token_id);
    }

    #[tokio::test]
    async fn second_rotation_with_stale_ppid_deletes_nothing() {
        let svc = service();
        let mut rows = Rows::default();
        let user_id = UserId::new();

        let creds = svc.issue(&mut rows, Subject(user_id)).await.unwrap();
        let session = svc.authenticate_refresh(&mut rows, &creds.refresh_token).await.unwrap();

        assert_eq!(svc.rotate(&mut rows, &session.ppid, user_id).await.unwrap(), 1);
        assert_eq!(svc.rotate(&mut rows, &session.ppid, user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_unauthorized() {
        let svc = service();
        let mut rows = Rows::default();
        let user_id = UserId::new();

        let creds = svc.issue(&mut rows, Subject(user_id)).await.unwrap();
        svc.revoke_all(&mut rows, user_id).await.unwrap();

        let err = svc.authenticate_refresh(&mut rows, &creds.refresh_token).await.unwrap_err();
        assert_eq!(err, DomainError::unauthorized("refresh token revoked"));
    }

    #[tokio::test]
    async fn tampered_record_is_unauthorized() {
        let svc = service();
        let mut rows = Rows::default();

        let creds = svc.issue(&mut rows, Subject(UserId::new())).await.unwrap();
        rows.0[0].ppid = "someone-else".to_string();

        let err = svc.authenticate_refresh(&mut rows, &creds.refresh_token).await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn access_token_is_not_a_refresh_token() {
        let svc = service();
        let mut rows = Rows::default();

        let creds = svc.issue(&mut rows, Subject(UserId::new())).await.unwrap();

        assert!(svc.authenticate_refresh(&mut rows, &creds.access_token).await.is_err());
        assert!(svc.authenticate_access(&creds.refresh_token).is_err());
    }

    #[tokio::test]
    async fn revoke_all_leaves_other_users_alone() {
        let svc = service();
        let mut rows = Rows::default();
        let (alice, bob) = (UserId::new(), UserId::new());

        svc.issue(&mut rows, Subject(alice)).await.unwrap();
        svc.issue(&mut rows, Subject(alice)).await.unwrap();
        svc.issue(&mut rows, Subject(bob)).await.unwrap();

        assert_eq!(svc.revoke_all(&mut rows, alice).await.unwrap(), 2);
        assert_eq!(rows.0.len(), 1);
        assert_eq!(rows.0[0].user_id, bob);
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_internal_and_persists_nothing() {
        let svc = TokenLifecycleService::new(
            Arc::new(Hs256Signer::new("access", "access-secret", Duration::minutes(15))),
            Arc::new(Hs256Signer::new("refresh", "refresh-secret", Duration::days(365 * 1_000_000))),
            Arc::new(OsRandom),
            Arc::new(SystemClock),
        );
        let mut rows = Rows::default();

        let err = svc.issue(&mut rows, Subject(UserId::new())).await.err().unwrap();

        assert_eq!(err.code(), "internal");
        assert!(rows.0.is_empty());
    }
}
