use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use reservo_core::{Clock, ServiceId};
use reservo_events::{BusError, DomainEvent, EventHandler, HandlerResult};
use reservo_marketplace::RatingStats;

use crate::deps::AppDeps;
use crate::mutations::reviews::events;
use crate::store::Store;

pub fn register(deps: &AppDeps) -> Result<(), BusError> {
    deps.bus.subscribe(
        events::CREATED,
        ProviderRating {
            store: deps.store.clone(),
            clock: deps.clock.clone(),
        },
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRef {
    service_id: ServiceId,
}

#[derive(Deserialize)]
struct ReviewCreated {
    review: ReviewRef,
}

/// Recomputes a provider's average rating and review count over all of its
/// services after each new review.
struct ProviderRating {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl EventHandler for ProviderRating {
    async fn handle(&self, event: Arc<DomainEvent>) -> HandlerResult {
        let ReviewCreated { review } = event.decode()?;

        let mut tx = self.store.begin().await?;
        let service = tx
            .find_service(review.service_id)
            .await?
            .with_context(|| format!("service {} not found", review.service_id))?;
        let mut provider = tx
            .find_provider(service.provider_id)
            .await?
            .with_context(|| format!("provider {} not found", service.provider_id))?;

        let service_ids: Vec<ServiceId> = tx
            .list_provider_services(provider.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let stats = RatingStats::from_ratings(tx.ratings_for_services(&service_ids).await?);

        provider.set_rating(stats, self.clock.now());
        tx.update_provider(&provider).await?;
        tx.commit().await?;

        info!(
            provider_id = %provider.id,
            rating = stats.avg_rating,
            reviews_count = stats.reviews_count,
            "provider rating updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use reservo_marketplace::{NewBooking, NewReview};

    use super::*;
    use crate::mutations::bookings::{complete_booking, confirm_booking, create_booking};
    use crate::mutations::reviews::create_review;
    use crate::mutations::testing::{Harness, ctx_for, harness, provider_with_service, signed_up};

    #[tokio::test]
    async fn rating_is_the_rounded_mean_over_all_provider_reviews() {
        let Harness { deps, store, .. } = harness();
        register(&deps).unwrap();

        let (owner, provider, service) = provider_with_service(&deps, "owner@example.com").await;
        let customer = signed_up(&deps, "c@example.com").await.user;

        for (hour, rating) in [(0, 4), (2, 5), (4, 5)] {
            let start = Utc::now() + Duration::days(1) + Duration::hours(hour);
            let booking = create_booking(
                &deps,
                &ctx_for(&customer),
                service.id,
                NewBooking {
                    start_at: start,
                    end_at: start + Duration::hours(1),
                    notes: None,
                },
            )
            .await
            .unwrap();
            confirm_booking(&deps, &ctx_for(&owner), booking.id).await.unwrap();
            complete_booking(&deps, &ctx_for(&owner), booking.id).await.unwrap();
            create_review(
                &deps,
                &ctx_for(&customer),
                booking.id,
                NewReview {
                    rating,
                    comment: None,
                },
            )
            .await
            .unwrap();
        }
        deps.bus.idle().await;

        let stored = store.read(|t| t.providers[&provider.id].clone()).await;
        assert_eq!(stored.reviews_count, 3);
        assert_eq!(stored.rating, 4.7);
    }
}
