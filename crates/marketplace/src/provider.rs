use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reservo_core::{ProviderId, UserId};

use crate::review::RatingStats;

/// A provider profile (at most one per user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: ProviderId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    /// Average review rating, one decimal.
    pub rating: f64,
    pub reviews_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProvider {
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

impl Provider {
    pub fn new(user_id: UserId, input: NewProvider, now: DateTime<Utc>) -> Self {
        Self {
            id: ProviderId::new(),
            user_id,
            name: input.name,
            description: input.description,
            logo_url: input.logo_url,
            rating: 0.0,
            reviews_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn can_be_managed_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn apply(&mut self, patch: ProviderPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        if patch.logo_url.is_some() {
            self.logo_url = patch.logo_url;
        }
        self.updated_at = now;
    }

    pub fn set_rating(&mut self, stats: RatingStats, now: DateTime<Utc>) {
        self.rating = stats.avg_rating;
        self.reviews_count = stats.reviews_count;
        self.updated_at = now;
    }
}
