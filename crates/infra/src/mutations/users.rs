//! User account maintenance.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use reservo_core::{DomainError, DomainResult, UserId};
use reservo_marketplace::{User, UserPatch, is_email_taken_by_other};

use super::hash_password;
use crate::deps::AppDeps;

pub mod events {
    pub const CREATED: &str = "users.created";
    pub const UPDATED: &str = "users.updated";
    pub const DELETED: &str = "users.deleted";
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

pub async fn create_user(deps: &AppDeps, input: CreateUserInput) -> DomainResult<User> {
    debug!(email = %input.email, "creating user");

    {
        let mut tx = deps.store.begin().await?;
        if tx.find_user_by_email(&input.email).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "user with email: {} already exists",
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
    tx.commit().await?;

    deps.bus
        .publish(events::CREATED, json!({ "userId": user.id }))
        .await;

    info!(user_id = %user.id, "user created");
    Ok(user)
}

pub async fn update_user(deps: &AppDeps, user_id: UserId, patch: UserPatch) -> DomainResult<User> {
    debug!(user_id = %user_id, "updating user");

    let mut tx = deps.store.begin().await?;
    let Some(mut user) = tx.find_user(user_id).await? else {
        return Err(DomainError::not_found(format!("user with id: {user_id} not found")));
    };

    if let Some(email) = &patch.email {
        let holder = tx.find_user_by_email(email).await?;
        if is_email_taken_by_other(holder.as_ref(), user_id) {
            return Err(DomainError::conflict(format!("user with email: {email} already exists")));
        }
    }

    if user.apply(&patch, deps.clock.now()) {
        tx.update_user(&user).await?;
    }
    tx.commit().await?;

    deps.bus
        .publish(events::UPDATED, json!({ "userId": user_id }))
        .await;

    info!(user_id = %user_id, "user updated");
    Ok(user)
}

/// Soft delete: the row stays, every lookup skips it.
pub async fn delete_user(deps: &AppDeps, user_id: UserId) -> DomainResult<User> {
    debug!(user_id = %user_id, "deleting user");

    let mut tx = deps.store.begin().await?;
    let Some(mut user) = tx.find_user(user_id).await? else {
        return Err(DomainError::not_found(format!("user with id: {user_id} not found")));
    };

    let now = deps.clock.now();
    user.deleted_at = Some(now);
    user.updated_at = now;
    tx.update_user(&user).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::DELETED, json!({ "userId": user_id }))
        .await;

    info!(user_id = %user_id, "user deleted");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::testing::{Harness, harness, record, signed_up};

    fn input(email: &str) -> CreateUserInput {
        CreateUserInput {
            email: email.to_string(),
            password: "P@ssw0rd1".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let Harness { deps, store, .. } = harness();
        let created = record(&deps, events::CREATED);

        let user = create_user(&deps, input("g@example.com")).await.unwrap();
        let err = create_user(&deps, input("G@Example.com")).await.unwrap_err();
        deps.bus.idle().await;

        assert_eq!(err.code(), "conflict");
        assert_eq!(store.read(|t| t.users.len()).await, 1);
        let payloads = created.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["userId"], json!(user.id));
    }

    #[tokio::test]
    async fn update_user_email_collision_is_conflict() {
        let Harness { deps, .. } = harness();
        let a = signed_up(&deps, "a@example.com").await.user;
        signed_up(&deps, "b@example.com").await;
        let updated = record(&deps, events::UPDATED);

        let err = update_user(
            &deps,
            a.id,
            UserPatch {
                email: Some("b@example.com".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "conflict");

        // Re-submitting one's own email is not a collision.
        let user = update_user(
            &deps,
            a.id,
            UserPatch {
                email: Some("a@example.com".to_string()),
                first_name: Some("Ann".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
        deps.bus.idle().await;

        assert_eq!(user.first_name, "Ann");
        assert_eq!(updated.payloads().len(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let Harness { deps, .. } = harness();
        let updated = record(&deps, events::UPDATED);

        let err = update_user(&deps, UserId::new(), UserPatch::default()).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        let err = delete_user(&deps, UserId::new()).await.unwrap_err();
        assert_eq!(err.code(), "not_found");

        deps.bus.idle().await;
        assert!(updated.payloads().is_empty());
    }

    #[tokio::test]
    async fn deleted_user_disappears_from_lookups() {
        let Harness { deps, store, .. } = harness();
        let user = signed_up(&deps, "a@example.com").await.user;
        let deleted = record(&deps, events::DELETED);

        delete_user(&deps, user.id).await.unwrap();
        deps.bus.idle().await;

        assert_eq!(store.read(|t| t.users.len()).await, 1);
        assert_eq!(delete_user(&deps, user.id).await.unwrap_err().code(), "not_found");
        assert_eq!(deleted.payloads().len(), 1);

        // The email becomes available again.
        create_user(&deps, input("a@example.com")).await.unwrap();
    }
}
