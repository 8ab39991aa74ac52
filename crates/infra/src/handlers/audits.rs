//! Audit trail: one [`AuditLog`] row per mutation event.
//!
//! Each rule names the event, the recorded action and entity type, and JSON
//! pointers into the payload for the entity id and the acting user.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use reservo_core::{Clock, UserId};
use reservo_events::{BusError, DomainEvent, EventHandler, HandlerResult};
use reservo_marketplace::{AuditAction, AuditLog, entity_type};

use crate::deps::AppDeps;
use crate::mutations::{auth, bookings, providers, reviews, services, users};
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
struct AuditRule {
    event: &'static str,
    action: AuditAction,
    entity_type: &'static str,
    entity_id: &'static str,
    actor: Option<&'static str>,
}

const fn rule(
    event: &'static str,
    action: AuditAction,
    entity_type: &'static str,
    entity_id: &'static str,
    actor: Option<&'static str>,
) -> AuditRule {
    AuditRule {
        event,
        action,
        entity_type,
        entity_id,
        actor,
    }
}

// `auth.tokens_refreshed` has no audit action and is not recorded.
const RULES: &[AuditRule] = &[
    rule(auth::events::SIGNED_UP, AuditAction::Create, entity_type::USER, "/user/id", Some("/user/id")),
    rule(auth::events::SIGNED_IN, AuditAction::Login, entity_type::USER, "/user/id", Some("/user/id")),
    rule(auth::events::SIGNED_OUT, AuditAction::Logout, entity_type::USER, "/userId", Some("/userId")),
    rule(auth::events::PASSWORD_RESET, AuditAction::PasswordReset, entity_type::USER, "/userId", Some("/userId")),
    rule(auth::events::PASSWORD_CHANGED, AuditAction::PasswordChange, entity_type::USER, "/user/id", Some("/user/id")),
    rule(users::events::CREATED, AuditAction::Create, entity_type::USER, "/userId", None),
    rule(users::events::UPDATED, AuditAction::Update, entity_type::USER, "/userId", None),
    rule(users::events::DELETED, AuditAction::Delete, entity_type::USER, "/userId", None),
    rule(providers::events::CREATED, AuditAction::Create, entity_type::PROVIDER, "/provider/id", Some("/userId")),
    rule(providers::events::UPDATED, AuditAction::Update, entity_type::PROVIDER, "/provider/id", Some("/userId")),
    rule(providers::events::DELETED, AuditAction::Delete, entity_type::PROVIDER, "/provider/id", Some("/userId")),
    rule(services::events::CREATED, AuditAction::Create, entity_type::SERVICE, "/service/id", Some("/user/id")),
    rule(services::events::UPDATED, AuditAction::Update, entity_type::SERVICE, "/service/id", Some("/user/id")),
    rule(services::events::DELETED, AuditAction::Delete, entity_type::SERVICE, "/service/id", Some("/user/id")),
    rule(bookings::events::CREATED, AuditAction::Create, entity_type::BOOKING, "/booking/id", Some("/userId")),
    rule(bookings::events::CONFIRMED, AuditAction::Confirm, entity_type::BOOKING, "/booking/id", Some("/userId")),
    rule(bookings::events::COMPLETED, AuditAction::Complete, entity_type::BOOKING, "/booking/id", Some("/userId")),
    rule(bookings::events::CANCELLED, AuditAction::Cancel, entity_type::BOOKING, "/booking/id", Some("/userId")),
    rule(reviews::events::CREATED, AuditAction::Create, entity_type::REVIEW, "/review/id", Some("/user/id")),
];

pub fn register(deps: &AppDeps) -> Result<(), BusError> {
    for rule in RULES {
        deps.bus.subscribe(
            rule.event,
            AuditTrail {
                rule: *rule,
                store: deps.store.clone(),
                clock: deps.clock.clone(),
            },
        )?;
    }
    Ok(())
}

struct AuditTrail {
    rule: AuditRule,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl EventHandler for AuditTrail {
    async fn handle(&self, event: Arc<DomainEvent>) -> HandlerResult {
        let payload = event.payload();
        let entity_id = uuid_at(payload, self.rule.entity_id)?;
        let actor = self
            .rule
            .actor
            .map(|pointer| uuid_at(payload, pointer).map(UserId::from_uuid))
            .transpose()?;

        let entry = AuditLog::new(
            self.rule.action,
            self.rule.entity_type,
            Some(entity_id),
            actor,
            payload.clone(),
            self.clock.now(),
        );

        let mut tx = self.store.begin().await?;
        tx.insert_audit_log(entry).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn uuid_at(payload: &JsonValue, pointer: &str) -> anyhow::Result<Uuid> {
    let raw = payload
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .with_context(|| format!("payload has no id at {pointer}"))?;
    Uuid::parse_str(raw).with_context(|| format!("invalid uuid at {pointer}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mutations::testing::{Harness, harness, provider_with_service, signed_up};

    #[test]
    fn every_rule_event_is_distinct() {
        let mut names: Vec<_> = RULES.iter().map(|r| r.event).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RULES.len());
        assert!(!names.contains(&auth::events::TOKENS_REFRESHED));
    }

    #[tokio::test]
    async fn mutations_leave_an_audit_trail() {
        let Harness { deps, store, .. } = harness();
        register(&deps).unwrap();

        let (owner, provider, service) = provider_with_service(&deps, "owner@example.com").await;
        deps.bus.idle().await;

        let logs = store.read(|t| t.audit_logs.clone()).await;
        let summary: Vec<_> = logs
            .iter()
            .map(|l| (l.action, l.entity_type.as_str(), l.entity_id, l.user_id))
            .collect();

        assert_eq!(summary.len(), 3);
        assert!(summary.contains(&(
            AuditAction::Create,
            entity_type::USER,
            Some(*owner.id.as_uuid()),
            Some(owner.id)
        )));
        assert!(summary.contains(&(
            AuditAction::Create,
            entity_type::PROVIDER,
            Some(*provider.id.as_uuid()),
            Some(owner.id)
        )));
        assert!(summary.contains(&(
            AuditAction::Create,
            entity_type::SERVICE,
            Some(*service.id.as_uuid()),
            Some(owner.id)
        )));
    }

    #[tokio::test]
    async fn payload_is_kept_as_metadata() {
        let Harness { deps, store, .. } = harness();
        register(&deps).unwrap();

        let user = signed_up(&deps, "a@example.com").await.user;
        users::delete_user(&deps, user.id).await.unwrap();
        deps.bus.idle().await;

        let logs = store.read(|t| t.audit_logs.clone()).await;
        let delete = logs
            .iter()
            .find(|l| l.action == AuditAction::Delete)
            .unwrap();
        assert_eq!(delete.user_id, None);
        assert_eq!(delete.metadata, json!({ "userId": user.id }));
    }

    #[tokio::test]
    async fn payload_without_entity_id_fails_the_handler() {
        let Harness { deps, store, sink, .. } = harness();
        register(&deps).unwrap();

        deps.bus
            .publish(users::events::CREATED, json!({ "userId": "not-a-uuid" }))
            .await;
        deps.bus.idle().await;

        assert_eq!(store.read(|t| t.audit_logs.len()).await, 0);
        assert_eq!(sink.failures().len(), 1);
    }
}
