use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use reservo_auth::{PasswordResetRepository, PasswordResetToken, RefreshTokenRecord, RefreshTokenRepository};
use reservo_core::{
    BookingId, DomainError, DomainResult, PasswordResetTokenId, ProviderId, RefreshTokenId, ReviewId,
    ServiceId, UserId,
};
use reservo_marketplace::{AuditLog, Booking, Provider, Review, Service, User, normalize_email};

use super::r#trait::{
    AuditRepository, BookingRepository, ProviderRepository, ReviewRepository, ServiceRepository, Store,
    Transaction, UserRepository,
};

/// Every table of the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: BTreeMap<UserId, User>,
    pub providers: BTreeMap<ProviderId, Provider>,
    pub services: BTreeMap<ServiceId, Service>,
    pub bookings: BTreeMap<BookingId, Booking>,
    pub reviews: BTreeMap<ReviewId, Review>,
    pub audit_logs: Vec<AuditLog>,
    pub refresh_tokens: BTreeMap<RefreshTokenId, RefreshTokenRecord>,
    pub reset_tokens: BTreeMap<PasswordResetTokenId, PasswordResetToken>,
}

/// In-memory transactional store.
///
/// Intended for tests/dev. Transactions are fully serialized: `begin` takes
/// the single store lock and holds it until commit or drop, so every
/// delete-and-count is atomic with respect to other transactions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect committed state.
    pub async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.lock().await;
        f(&tables)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> DomainResult<Box<dyn Transaction>> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            tables,
            rollback: None,
            committed: false,
        }))
    }
}

/// Exclusive handle on the store tables.
///
/// The pre-transaction state is copied on the first write and restored on
/// drop unless the transaction committed.
pub struct InMemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    rollback: Option<Tables>,
    committed: bool,
}

impl InMemoryTransaction {
    fn read(&self) -> &Tables {
        &self.tables
    }

    fn write(&mut self) -> &mut Tables {
        if self.rollback.is_none() {
            self.rollback = Some(self.tables.clone());
        }
        &mut self.tables
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(before) = self.rollback.take() {
            *self.tables = before;
            debug!("transaction rolled back");
        }
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self: Box<Self>) -> DomainResult<()> {
        self.committed = true;
        self.rollback = None;
        Ok(())
    }
}

fn live_user_by_email<'a>(tables: &'a Tables, email: &str) -> Option<&'a User> {
    tables
        .users
        .values()
        .find(|u| !u.is_deleted() && u.email == email)
}

#[async_trait]
impl UserRepository for InMemoryTransaction {
    async fn insert_user(&mut self, user: User) -> DomainResult<User> {
        if live_user_by_email(self.read(), &user.email).is_some() {
            return Err(DomainError::conflict(format!(
                "user with email: {} already registered",
                user.email
            )));
        }
        self.write().users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&mut self, id: UserId) -> DomainResult<Option<User>> {
        Ok(self.read().users.get(&id).filter(|u| !u.is_deleted()).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> DomainResult<Option<User>> {
        Ok(live_user_by_email(self.read(), &normalize_email(email)).cloned())
    }

    async fn update_user(&mut self, user: &User) -> DomainResult<()> {
        if !self.read().users.contains_key(&user.id) {
            return Err(DomainError::not_found(format!("user with id: {} not found", user.id)));
        }
        if live_user_by_email(self.read(), &user.email).is_some_and(|other| other.id != user.id) {
            return Err(DomainError::conflict(format!(
                "user with email: {} already exists",
                user.email
            )));
        }
        self.write().users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl ProviderRepository for InMemoryTransaction {
    async fn insert_provider(&mut self, provider: Provider) -> DomainResult<Provider> {
        let taken = self
            .read()
            .providers
            .values()
            .any(|p| !p.is_deleted() && p.user_id == provider.user_id);
        if taken {
            return Err(DomainError::conflict("user already has a provider profile"));
        }
        self.write().providers.insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn find_provider(&mut self, id: ProviderId) -> DomainResult<Option<Provider>> {
        Ok(self.read().providers.get(&id).filter(|p| !p.is_deleted()).cloned())
    }

    async fn find_provider_by_user(&mut self, user_id: UserId) -> DomainResult<Option<Provider>> {
        Ok(self
            .read()
            .providers
            .values()
            .find(|p| !p.is_deleted() && p.user_id == user_id)
            .cloned())
    }

    async fn update_provider(&mut self, provider: &Provider) -> DomainResult<()> {
        if !self.read().providers.contains_key(&provider.id) {
            return Err(DomainError::not_found(format!("provider with id: {} not found", provider.id)));
        }
        self.write().providers.insert(provider.id, provider.clone());
        Ok(())
    }
}

#[async_trait]
impl ServiceRepository for InMemoryTransaction {
    async fn insert_service(&mut self, service: Service) -> DomainResult<Service> {
        self.write().services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn find_service(&mut self, id: ServiceId) -> DomainResult<Option<Service>> {
        Ok(self
            .read()
            .services
            .get(&id)
            .filter(|s| s.deleted_at.is_none())
            .cloned())
    }

    async fn list_provider_services(&mut self, provider_id: ProviderId) -> DomainResult<Vec<Service>> {
        Ok(self
            .read()
            .services
            .values()
            .filter(|s| s.provider_id == provider_id && s.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn update_service(&mut self, service: &Service) -> DomainResult<()> {
        if !self.read().services.contains_key(&service.id) {
            return Err(DomainError::not_found(format!("service with id: {} not found", service.id)));
        }
        self.write().services.insert(service.id, service.clone());
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for InMemoryTransaction {
    async fn insert_booking(&mut self, booking: Booking) -> DomainResult<Booking> {
        self.write().bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&mut self, id: BookingId) -> DomainResult<Option<Booking>> {
        Ok(self.read().bookings.get(&id).cloned())
    }

    async fn find_conflicting_bookings(
        &mut self,
        service_id: ServiceId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        Ok(self
            .read()
            .bookings
            .values()
            .filter(|b| b.service_id == service_id && b.conflicts_with(start_at, end_at))
            .cloned()
            .collect())
    }

    async fn update_booking(&mut self, booking: &Booking) -> DomainResult<()> {
        if !self.read().bookings.contains_key(&booking.id) {
            return Err(DomainError::not_found(format!("booking with id: {} not found", booking.id)));
        }
        self.write().bookings.insert(booking.id, booking.clone());
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for InMemoryTransaction {
    async fn insert_review(&mut self, review: Review) -> DomainResult<Review> {
        if self.read().reviews.values().any(|r| r.booking_id == review.booking_id) {
            return Err(DomainError::conflict("review already exists for this booking"));
        }
        self.write().reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn find_review_by_booking(&mut self, booking_id: BookingId) -> DomainResult<Option<Review>> {
        Ok(self
            .read()
            .reviews
            .values()
            .find(|r| r.booking_id == booking_id)
            .cloned())
    }

    async fn ratings_for_services(&mut self, service_ids: &[ServiceId]) -> DomainResult<Vec<u8>> {
        Ok(self
            .read()
            .reviews
            .values()
            .filter(|r| service_ids.contains(&r.service_id))
            .map(|r| r.rating)
            .collect())
    }
}

#[async_trait]
impl AuditRepository for InMemoryTransaction {
    async fn insert_audit_log(&mut self, entry: AuditLog) -> DomainResult<()> {
        self.write().audit_logs.push(entry);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryTransaction {
    async fn create_refresh_token(&mut self, record: RefreshTokenRecord) -> DomainResult<()> {
        if self.read().refresh_tokens.contains_key(&record.id) {
            return Err(DomainError::internal("duplicate refresh token id"));
        }
        self.write().refresh_tokens.insert(record.id, record);
        Ok(())
    }

    async fn find_refresh_token(&mut self, id: RefreshTokenId) -> DomainResult<Option<RefreshTokenRecord>> {
        Ok(self.read().refresh_tokens.get(&id).cloned())
    }

    async fn delete_refresh_tokens(&mut self, ppid: &str, user_id: UserId) -> DomainResult<u64> {
        let doomed: Vec<RefreshTokenId> = self
            .read()
            .refresh_tokens
            .values()
            .filter(|r| r.ppid == ppid && r.user_id == user_id)
            .map(|r| r.id)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let table = &mut self.write().refresh_tokens;
        for id in &doomed {
            table.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn delete_user_refresh_tokens(&mut self, user_id: UserId) -> DomainResult<u64> {
        let before = self.read().refresh_tokens.len();
        if !self.read().refresh_tokens.values().any(|r| r.user_id == user_id) {
            return Ok(0);
        }

        let table = &mut self.write().refresh_tokens;
        table.retain(|_, r| r.user_id != user_id);
        Ok((before - table.len()) as u64)
    }
}

#[async_trait]
impl PasswordResetRepository for InMemoryTransaction {
    async fn create_reset_token(&mut self, token: PasswordResetToken) -> DomainResult<()> {
        self.write().reset_tokens.insert(token.id, token);
        Ok(())
    }

    async fn find_reset_token(&mut self, token: &str) -> DomainResult<Option<PasswordResetToken>> {
        Ok(self
            .read()
            .reset_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn mark_reset_token_used(&mut self, id: PasswordResetTokenId, at: DateTime<Utc>) -> DomainResult<bool> {
        match self.read().reset_tokens.get(&id) {
            Some(token) if !token.is_used() => {}
            _ => return Ok(false),
        }
        if let Some(token) = self.write().reset_tokens.get_mut(&id) {
            token.used_at = Some(at);
        }
        Ok(true)
    }

    async fn invalidate_reset_tokens(&mut self, email: &str, at: DateTime<Utc>) -> DomainResult<u64> {
        let mut invalidated = 0;
        for token in self.write().reset_tokens.values_mut() {
            if !token.is_used() && token.email.eq_ignore_ascii_case(email) {
                token.used_at = Some(at);
                invalidated += 1;
            }
        }
        Ok(invalidated)
    }
}
