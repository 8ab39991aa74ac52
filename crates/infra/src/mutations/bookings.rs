//! Booking creation and status transitions.
//!
//! ```text
//! create   customer      -> pending
//! confirm  provider      pending -> confirmed
//! complete provider      confirmed -> completed
//! cancel   either party  pending | confirmed -> cancelled
//! ```

use serde_json::json;
use tracing::{debug, info};

use reservo_auth::SessionContext;
use reservo_core::{BookingId, DomainError, DomainResult, ServiceId};
use reservo_marketplace::{Booking, BookingStatus, NewBooking, Provider};

use crate::deps::AppDeps;
use crate::store::Transaction;

pub mod events {
    pub const CREATED: &str = "bookings.created";
    pub const CONFIRMED: &str = "bookings.confirmed";
    pub const COMPLETED: &str = "bookings.completed";
    pub const CANCELLED: &str = "bookings.cancelled";
}

/// Book `[start_at, end_at)` on an active service.
///
/// The overlap check and the insert share one transaction, so two callers
/// racing for the same slot cannot both win.
pub async fn create_booking(
    deps: &AppDeps,
    ctx: &SessionContext,
    service_id: ServiceId,
    input: NewBooking,
) -> DomainResult<Booking> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, service_id = %service_id, "creating booking");

    let mut tx = deps.store.begin().await?;
    if tx.find_user(user_id).await?.is_none() {
        return Err(DomainError::unauthorized("user not found"));
    }
    let service = tx
        .find_service(service_id)
        .await?
        .filter(|s| s.is_bookable())
        .ok_or_else(|| DomainError::not_found(format!("service with id: {service_id} not found or inactive")))?;

    let booking = Booking::new(service.id, user_id, input, deps.clock.now())?;

    let conflicts = tx
        .find_conflicting_bookings(service.id, booking.start_at, booking.end_at)
        .await?;
    if !conflicts.is_empty() {
        return Err(DomainError::conflict("time slot is already booked"));
    }

    let booking = tx.insert_booking(booking).await?;
    tx.commit().await?;

    deps.bus
        .publish(events::CREATED, json!({ "booking": booking, "userId": user_id }))
        .await;

    info!(booking_id = %booking.id, service_id = %service_id, "booking created");
    Ok(booking)
}

pub async fn confirm_booking(deps: &AppDeps, ctx: &SessionContext, booking_id: BookingId) -> DomainResult<Booking> {
    transition(deps, ctx, booking_id, BookingStatus::Confirmed, Party::Provider, events::CONFIRMED).await
}

pub async fn complete_booking(deps: &AppDeps, ctx: &SessionContext, booking_id: BookingId) -> DomainResult<Booking> {
    transition(deps, ctx, booking_id, BookingStatus::Completed, Party::Provider, events::COMPLETED).await
}

pub async fn cancel_booking(deps: &AppDeps, ctx: &SessionContext, booking_id: BookingId) -> DomainResult<Booking> {
    transition(deps, ctx, booking_id, BookingStatus::Cancelled, Party::Either, events::CANCELLED).await
}

/// Who may drive a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Provider,
    Either,
}

async fn transition(
    deps: &AppDeps,
    ctx: &SessionContext,
    booking_id: BookingId,
    next: BookingStatus,
    party: Party,
    event_name: &'static str,
) -> DomainResult<Booking> {
    let user_id = ctx.user_id()?;
    debug!(user_id = %user_id, booking_id = %booking_id, next = %next, "booking transition");

    let mut tx = deps.store.begin().await?;
    let Some(mut booking) = tx.find_booking(booking_id).await? else {
        return Err(DomainError::not_found(format!("booking with id: {booking_id} not found")));
    };

    let provider = provider_of(&mut *tx, &booking).await?;
    let allowed = match party {
        Party::Provider => provider.can_be_managed_by(user_id),
        Party::Either => provider.can_be_managed_by(user_id) || booking.user_id == user_id,
    };
    if !allowed {
        return Err(DomainError::forbidden(format!("you cannot mark this booking {next}")));
    }

    booking.transition(next, deps.clock.now())?;
    tx.update_booking(&booking).await?;
    tx.commit().await?;

    deps.bus
        .publish(event_name, json!({ "booking": booking, "userId": user_id }))
        .await;

    info!(booking_id = %booking_id, status = %next, "booking updated");
    Ok(booking)
}

async fn provider_of(tx: &mut dyn Transaction, booking: &Booking) -> DomainResult<Provider> {
    let Some(service) = tx.find_service(booking.service_id).await? else {
        return Err(DomainError::not_found("service not found"));
    };
    tx.find_provider(service.provider_id)
        .await?
        .ok_or_else(|| DomainError::not_found("provider not found"))
}
