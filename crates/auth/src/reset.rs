use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use reservo_core::{DomainResult, PasswordResetTokenId};

/// Default lifetime of a password reset token.
pub fn default_reset_ttl() -> Duration {
    Duration::hours(1)
}

/// Single-use password reset token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetToken {
    pub id: PasswordResetTokenId,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(email: impl Into<String>, token: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: PasswordResetTokenId::new(),
            email: email.into(),
            token: token.into(),
            expires_at: now + ttl,
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Unused and strictly before expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired_at(now)
    }
}

#[async_trait]
pub trait PasswordResetRepository: Send {
    async fn create_reset_token(&mut self, token: PasswordResetToken) -> DomainResult<()>;

    async fn find_reset_token(&mut self, token: &str) -> DomainResult<Option<PasswordResetToken>>;

    /// Set `used_at` only if still unused; `false` when another caller won.
    async fn mark_reset_token_used(&mut self, id: PasswordResetTokenId, at: DateTime<Utc>) -> DomainResult<bool>;

    /// Mark every unused token issued for `email` as used; returns how many.
    async fn invalidate_reset_tokens(&mut self, email: &str, at: DateTime<Utc>) -> DomainResult<u64>;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn valid_until_one_hour_and_not_after() {
        let token = PasswordResetToken::new("a@example.com", "t", now(), default_reset_ttl());

        assert!(token.is_valid_at(now()));
        assert!(token.is_valid_at(now() + Duration::minutes(59)));
        assert!(!token.is_valid_at(now() + Duration::hours(1)));
        assert!(!token.is_valid_at(now() + Duration::hours(1) + Duration::seconds(1)));
    }

    #[test]
    fn used_token_is_never_valid() {
        let mut token = PasswordResetToken::new("a@example.com", "t", now(), default_reset_ttl());
        token.used_at = Some(now());

        assert!(token.is_used());
        assert!(!token.is_valid_at(now()));
    }
}
