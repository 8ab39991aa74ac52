use serde_json::json;
use tracing::{debug, info};

use reservo_auth::SessionContext;
use reservo_core::{BookingId, DomainError, DomainResult};
use reservo_marketplace::{NewReview, Review, can_leave_review, validate_rating};

use crate::deps::AppDeps;

pub mod events {
    pub const CREATED: &str = "reviews.created";
}

/// Review a completed booking. The provider rating is refreshed by the
/// `reviews.created` handler, not here.
pub async fn create_review(
    deps: &AppDeps,
    ctx: &SessionContext,
    booking_id: BookingId,
    input: NewReview,
) -> DomainResult<Review> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, booking_id = %booking_id, "creating review");

    validate_rating(input.rating)?;

    let mut tx = deps.store.begin().await?;
    let Some(user) = tx.find_user(user_id).await? else {
        return Err(DomainError::unauthorized("user not found"));
    };
    let Some(booking) = tx.find_booking(booking_id).await? else {
        return Err(DomainError::not_found(format!("booking with id: {booking_id} not found")));
    };
    if !can_leave_review(&booking, user.id) {
        return Err(DomainError::forbidden(
            "only the customer of a completed booking can review it",
        ));
    }
    if tx.find_review_by_booking(booking.id).await?.is_some() {
        return Err(DomainError::conflict("review already exists for this booking"));
    }

    let review = tx
        .insert_review(Review::new(&booking, input, deps.clock.now())?)
        .await?;
    tx.commit().await?;

    deps.bus
        .publish(events::CREATED, json!({ "review": review, "user": user }))
        .await;

    info!(review_id = %review.id, booking_id = %booking_id, "review created");
    Ok(review)
}
