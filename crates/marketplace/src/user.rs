use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reservo_auth::TokenSubject;
use reservo_core::UserId;

/// A user account.
///
/// `password_hash` never leaves the process: it is skipped on serialization,
/// so event payloads and API responses carry the public view only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email: normalize_email(&email.into()),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply a partial update; returns `true` if anything changed.
    pub fn apply(&mut self, patch: &UserPatch, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if let Some(email) = &patch.email {
            let email = normalize_email(email);
            if email != self.email {
                self.email = email;
                changed = true;
            }
        }
        if let Some(first_name) = &patch.first_name {
            changed |= replace(&mut self.first_name, first_name);
        }
        if let Some(last_name) = &patch.last_name {
            changed |= replace(&mut self.last_name, last_name);
        }
        if changed {
            self.updated_at = now;
        }
        changed
    }
}

impl TokenSubject for User {
    fn subject_id(&self) -> UserId {
        self.id
    }
}

/// Partial user update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Emails compare case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `true` if `existing` is a different user holding the email.
pub fn is_email_taken_by_other(existing: Option<&User>, current: UserId) -> bool {
    existing.is_some_and(|user| user.id != current)
}

fn replace(slot: &mut String, value: &str) -> bool {
    if slot == value {
        return false;
    }
    *slot = value.to_string();
    true
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn serialization_hides_password_hash() {
        let user = User::new("A@Example.com ", "Ada", "Lovelace", "$2b$hash", t0());
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["email"], "a@example.com");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("deletedAt").is_none());
    }

    #[test]
    fn email_taken_only_by_someone_else() {
        let user = User::new("a@example.com", "A", "B", "h", t0());

        assert!(!is_email_taken_by_other(None, user.id));
        assert!(!is_email_taken_by_other(Some(&user), user.id));
        assert!(is_email_taken_by_other(Some(&user), UserId::new()));
    }

    #[test]
    fn apply_touches_updated_at_only_on_change() {
        let mut user = User::new("a@example.com", "A", "B", "h", t0());
        let later = t0() + chrono::Duration::hours(1);

        assert!(!user.apply(&UserPatch::default(), later));
        assert_eq!(user.updated_at, t0());

        let patch = UserPatch {
            first_name: Some("Ada".to_string()),
            ..UserPatch::default()
        };
        assert!(user.apply(&patch, later));
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.updated_at, later);
    }
}
