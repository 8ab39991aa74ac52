use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use reservo_events::{BusError, DomainEvent, EventHandler, HandlerResult};
use reservo_marketplace::User;

use crate::deps::AppDeps;
use crate::mailer::{Email, Mailer};
use crate::mutations::auth::events;

pub fn register(deps: &AppDeps) -> Result<(), BusError> {
    deps.bus.subscribe(
        events::SIGNED_UP,
        WelcomeEmail {
            mailer: deps.mailer.clone(),
        },
    )
}

#[derive(Deserialize)]
struct SignedUp {
    user: User,
}

/// Greets every new account.
struct WelcomeEmail {
    mailer: Arc<dyn Mailer>,
}

#[async_trait]
impl EventHandler for WelcomeEmail {
    async fn handle(&self, event: Arc<DomainEvent>) -> HandlerResult {
        let SignedUp { user } = event.decode()?;
        self.mailer
            .send(Email::Welcome {
                to: user.email,
                first_name: user.first_name,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::testing::{Harness, harness, signed_up};

    #[tokio::test]
    async fn sign_up_sends_a_welcome_email() {
        let Harness { deps, mailer, .. } = harness();
        register(&deps).unwrap();

        signed_up(&deps, "new@example.com").await;
        deps.bus.idle().await;

        assert_eq!(
            mailer.sent(),
            vec![Email::Welcome {
                to: "new@example.com".to_string(),
                first_name: "Ada".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_not_raised() {
        let Harness { deps, sink, mailer, .. } = harness();
        register(&deps).unwrap();

        let handlers = deps
            .bus
            .publish(events::SIGNED_UP, serde_json::json!({ "user": "nobody" }))
            .await;
        deps.bus.idle().await;

        assert_eq!(handlers, 1);
        assert!(mailer.sent().is_empty());
        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].event_name, events::SIGNED_UP);
    }
}
