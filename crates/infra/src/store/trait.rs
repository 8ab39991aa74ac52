use async_trait::async_trait;
use chrono::{DateTime, Utc};

use reservo_auth::{PasswordResetRepository, RefreshTokenRepository};
use reservo_core::{BookingId, DomainResult, ProviderId, ServiceId, UserId};
use reservo_marketplace::{AuditLog, Booking, Provider, Review, Service, User};

/// User rows. Lookups skip soft-deleted users.
#[async_trait]
pub trait UserRepository: Send {
    /// `Conflict` if the email is already registered.
    async fn insert_user(&mut self, user: User) -> DomainResult<User>;

    async fn find_user(&mut self, id: UserId) -> DomainResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> DomainResult<Option<User>>;

    /// Replace the stored row. `NotFound` if absent, `Conflict` on a duplicate email.
    async fn update_user(&mut self, user: &User) -> DomainResult<()>;
}

#[async_trait]
pub trait ProviderRepository: Send {
    /// `Conflict` if the user already has a provider profile.
    async fn insert_provider(&mut self, provider: Provider) -> DomainResult<Provider>;

    async fn find_provider(&mut self, id: ProviderId) -> DomainResult<Option<Provider>>;

    async fn find_provider_by_user(&mut self, user_id: UserId) -> DomainResult<Option<Provider>>;

    async fn update_provider(&mut self, provider: &Provider) -> DomainResult<()>;
}

#[async_trait]
pub trait ServiceRepository: Send {
    async fn insert_service(&mut self, service: Service) -> DomainResult<Service>;

    async fn find_service(&mut self, id: ServiceId) -> DomainResult<Option<Service>>;

    /// Live services of a provider.
    async fn list_provider_services(&mut self, provider_id: ProviderId) -> DomainResult<Vec<Service>>;

    async fn update_service(&mut self, service: &Service) -> DomainResult<()>;
}

#[async_trait]
pub trait BookingRepository: Send {
    async fn insert_booking(&mut self, booking: Booking) -> DomainResult<Booking>;

    async fn find_booking(&mut self, id: BookingId) -> DomainResult<Option<Booking>>;

    /// Bookings of `service_id` that hold their slot and intersect `[start_at, end_at)`.
    async fn find_conflicting_bookings(
        &mut self,
        service_id: ServiceId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>>;

    async fn update_booking(&mut self, booking: &Booking) -> DomainResult<()>;
}

#[async_trait]
pub trait ReviewRepository: Send {
    /// `Conflict` if the booking already has a review.
    async fn insert_review(&mut self, review: Review) -> DomainResult<Review>;

    async fn find_review_by_booking(&mut self, booking_id: BookingId) -> DomainResult<Option<Review>>;

    /// Ratings of every review on the given services.
    async fn ratings_for_services(&mut self, service_ids: &[ServiceId]) -> DomainResult<Vec<u8>>;
}

#[async_trait]
pub trait AuditRepository: Send {
    async fn insert_audit_log(&mut self, entry: AuditLog) -> DomainResult<()>;
}

/// A unit of work spanning every repository.
///
/// Dropping a transaction without calling [`Transaction::commit`] discards
/// its writes.
#[async_trait]
pub trait Transaction:
    UserRepository
    + ProviderRepository
    + ServiceRepository
    + BookingRepository
    + ReviewRepository
    + AuditRepository
    + RefreshTokenRepository
    + PasswordResetRepository
    + Send
{
    async fn commit(self: Box<Self>) -> DomainResult<()>;
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn begin(&self) -> DomainResult<Box<dyn Transaction>>;
}
