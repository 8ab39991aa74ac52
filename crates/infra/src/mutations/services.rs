use serde_json::json;
use tracing::{debug, info};

use reservo_auth::SessionContext;
use reservo_core::{DomainError, DomainResult, ProviderId, ServiceId};
use reservo_marketplace::{NewService, Service, ServicePatch, User, can_user_edit_service};

use crate::deps::AppDeps;
use crate::store::Transaction;

pub mod events {
    pub const CREATED: &str = "services.created";
    pub const UPDATED: &str = "services.updated";
    pub const DELETED: &str = "services.deleted";
}

pub async fn create_service(
    deps: &AppDeps,
    ctx: &SessionContext,
    provider_id: ProviderId,
    input: NewService,
) -> DomainResult<Service> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, provider_id = %provider_id, "creating service");

    let mut tx = deps.store.begin().await?;
    let user = current_user(&mut *tx, ctx).await?;
    let Some(provider) = tx.find_provider(provider_id).await? else {
        return Err(DomainError::not_found(format!("provider with id: {provider_id} not found")));
    };
    if !provider.can_be_managed_by(user.id) {
        return Err(DomainError::forbidden("you can only add services to your own provider"));
    }

    let service = tx
        .insert_service(Service::new(provider.id, input, deps.clock.now()))
        .await?;
    tx.commit().await?;

    deps.bus
        .publish(events::CREATED, json!({ "service": service, "user": user }))
        .await;

    info!(service_id = %service.id, provider_id = %provider_id, "service created");
    Ok(service)
}

pub async fn update_service(
    deps: &AppDeps,
    ctx: &SessionContext,
    service_id: ServiceId,
    patch: ServicePatch,
) -> DomainResult<Service> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, service_id = %service_id, "updating service");

    let mut tx = deps.store.begin().await?;
    let (user, mut service) = editable_service(&mut *tx, ctx, service_id).await?;
    service.apply(patch, deps.clock.now());
    tx.update_service(&service).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::UPDATED, json!({ "service": service, "user": user }))
        .await;

    info!(service_id = %service_id, "service updated");
    Ok(service)
}

/// Soft delete; existing bookings keep their reference.
pub async fn delete_service(deps: &AppDeps, ctx: &SessionContext, service_id: ServiceId) -> DomainResult<Service> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, service_id = %service_id, "deleting service");

    let mut tx = deps.store.begin().await?;
    let (user, mut service) = editable_service(&mut *tx, ctx, service_id).await?;
    let now = deps.clock.now();
    service.deleted_at = Some(now);
    service.updated_at = now;
    tx.update_service(&service).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::DELETED, json!({ "service": service, "user": user }))
        .await;

    info!(service_id = %service_id, "service deleted");
    Ok(service)
}

/// The authenticated user must still exist.
async fn current_user(tx: &mut dyn Transaction, ctx: &SessionContext) -> DomainResult<User> {
    tx.find_user(ctx.user_id()?)
        .await?
        .ok_or_else(|| DomainError::unauthorized("user not found"))
}

async fn editable_service(
    tx: &mut dyn Transaction,
    ctx: &SessionContext,
    service_id: ServiceId,
) -> DomainResult<(User, Service)> {
    let user = current_user(tx, ctx).await?;
    let Some(service) = tx.find_service(service_id).await? else {
        return Err(DomainError::not_found(format!("service with id: {service_id} not found")));
    };
    let Some(provider) = tx.find_provider(service.provider_id).await? else {
        return Err(DomainError::not_found("provider not found"));
    };
    if !can_user_edit_service(&service, &provider, user.id) {
        return Err(DomainError::forbidden("you can only manage services of your own provider"));
    }
    Ok((user, service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::testing::{Harness, ctx_for, harness, provider_with_service, record, signed_up};

    fn massage() -> NewService {
        NewService {
            name: "Massage".to_string(),
            description: Some("60 minutes".to_string()),
            price_cents: 6_000,
            duration_minutes: 60,
        }
    }

    #[tokio::test]
    async fn create_service_checks_user_provider_and_ownership() {
        let Harness { deps, store, .. } = harness();
        let (owner, provider, _) = provider_with_service(&deps, "owner@example.com").await;
        let stranger = signed_up(&deps, "s@example.com").await.user;
        let created = record(&deps, events::CREATED);

        let ghost = ctx_for(&User::new("g@example.com", "G", "H", "", deps.clock.now()));
        let err = create_service(&deps, &ghost, provider.id, massage()).await.unwrap_err();
        assert_eq!(err.code(), "unauthorized");

        let err = create_service(&deps, &ctx_for(&owner), ProviderId::new(), massage())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");

        let err = create_service(&deps, &ctx_for(&stranger), provider.id, massage())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");

        let service = create_service(&deps, &ctx_for(&owner), provider.id, massage())
            .await
            .unwrap();
        deps.bus.idle().await;

        assert!(service.is_active);
        assert_eq!(store.read(|t| t.services.len()).await, 2);
        let payloads = created.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["service"]["id"], json!(service.id));
        assert_eq!(payloads[0]["user"]["id"], json!(owner.id));
    }

    #[tokio::test]
    async fn update_and_delete_are_owner_only() {
        let Harness { deps, .. } = harness();
        let (owner, _, service) = provider_with_service(&deps, "owner@example.com").await;
        let stranger = signed_up(&deps, "s@example.com").await.user;

        let patch = ServicePatch {
            is_active: Some(false),
            ..ServicePatch::default()
        };
        let err = update_service(&deps, &ctx_for(&stranger), service.id, patch.clone())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");

        let updated = update_service(&deps, &ctx_for(&owner), service.id, patch)
            .await
            .unwrap();
        assert!(!updated.is_bookable());

        delete_service(&deps, &ctx_for(&owner), service.id).await.unwrap();
        let err = update_service(&deps, &ctx_for(&owner), service.id, ServicePatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
