use serde_json::json;
use tracing::{debug, info};

use reservo_auth::SessionContext;
use reservo_core::{DomainError, DomainResult, ProviderId};
use reservo_marketplace::{NewProvider, Provider, ProviderPatch};

use crate::deps::AppDeps;
use crate::store::Transaction;

pub mod events {
    pub const CREATED: &str = "providers.created";
    pub const UPDATED: &str = "providers.updated";
    pub const DELETED: &str = "providers.deleted";
}

/// One provider profile per user.
pub async fn create_provider(deps: &AppDeps, ctx: &SessionContext, input: NewProvider) -> DomainResult<Provider> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, "creating provider");

    let mut tx = deps.store.begin().await?;
    if tx.find_user(user_id).await?.is_none() {
        return Err(DomainError::unauthorized("user not found"));
    }
    if tx.find_provider_by_user(user_id).await?.is_some() {
        return Err(DomainError::conflict("user already has a provider profile"));
    }
    let provider = tx
        .insert_provider(Provider::new(user_id, input, deps.clock.now()))
        .await?;
    tx.commit().await?;

    deps.bus
        .publish(events::CREATED, json!({ "provider": provider, "userId": user_id }))
        .await;

    info!(user_id = %user_id, provider_id = %provider.id, "provider created");
    Ok(provider)
}

pub async fn update_provider(
    deps: &AppDeps,
    ctx: &SessionContext,
    provider_id: ProviderId,
    patch: ProviderPatch,
) -> DomainResult<Provider> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, provider_id = %provider_id, "updating provider");

    let mut tx = deps.store.begin().await?;
    let mut provider = owned_provider(&mut *tx, provider_id, ctx).await?;
    provider.apply(patch, deps.clock.now());
    tx.update_provider(&provider).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::UPDATED, json!({ "provider": provider, "userId": user_id }))
        .await;

    info!(provider_id = %provider_id, "provider updated");
    Ok(provider)
}

/// Soft delete.
pub async fn delete_provider(deps: &AppDeps, ctx: &SessionContext, provider_id: ProviderId) -> DomainResult<Provider> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, provider_id = %provider_id, "deleting provider");

    let mut tx = deps.store.begin().await?;
    let mut provider = owned_provider(&mut *tx, provider_id, ctx).await?;
    let now = deps.clock.now();
    provider.deleted_at = Some(now);
    provider.updated_at = now;
    tx.update_provider(&provider).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::DELETED, json!({ "provider": provider, "userId": user_id }))
        .await;

    info!(provider_id = %provider_id, "provider deleted");
    Ok(provider)
}

async fn owned_provider(
    tx: &mut dyn Transaction,
    provider_id: ProviderId,
    ctx: &SessionContext,
) -> DomainResult<Provider> {
    let user_id = ctx.user_id()?;
    let Some(provider) = tx.find_provider(provider_id).await? else {
        return Err(DomainError::not_found(format!("provider with id: {provider_id} not found")));
    };
    if !provider.can_be_managed_by(user_id) {
        return Err(DomainError::forbidden("you can only manage your own provider profile"));
    }
    Ok(provider)
}
