use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reservo_core::{ProviderId, ServiceId, UserId};

use crate::provider::Provider;

/// A bookable service offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: ServiceId,
    pub provider_id: ProviderId,
    pub name: String,
    pub description: Option<String>,
    /// Smallest currency unit.
    pub price_cents: u64,
    pub duration_minutes: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: u64,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<u64>,
    pub duration_minutes: Option<u32>,
    pub is_active: Option<bool>,
}

impl Service {
    pub fn new(provider_id: ProviderId, input: NewService, now: DateTime<Utc>) -> Self {
        Self {
            id: ServiceId::new(),
            provider_id,
            name: input.name,
            description: input.description,
            price_cents: input.price_cents,
            duration_minutes: input.duration_minutes,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Active and not soft-deleted.
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn apply(&mut self, patch: ServicePatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if let Some(price) = patch.price_cents {
            self.price_cents = price;
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
    }
}

/// The service belongs to `provider` and `provider` belongs to `user_id`.
pub fn can_user_edit_service(service: &Service, provider: &Provider, user_id: UserId) -> bool {
    service.provider_id == provider.id && provider.can_be_managed_by(user_id)
}
