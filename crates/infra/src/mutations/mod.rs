//! Mutation orchestrators.
//!
//! Every mutation follows the same pipeline:
//!
//! ```text
//! 1. read identity/credentials from the SessionContext (authenticated ops)
//!   ↓
//! 2. precondition checks against the store, failing fast with a typed error
//!   ↓
//! 3. writes inside one unit of work (Store::begin → commit)
//!   ↓
//! 4. publish exactly one domain event, after commit
//!   ↓
//! 5. return the result
//! ```
//!
//! Step 4 never runs when step 2 or 3 fails, so a rejected mutation publishes
//! nothing. Handlers re-reading the store observe the committed state.
//!
//! Password hashing runs on the blocking pool and outside any transaction.

use serde::{Deserialize, Serialize};

use reservo_core::{DomainError, DomainResult};

use crate::deps::AppDeps;

pub mod auth;
pub mod bookings;
pub mod providers;
pub mod reviews;
pub mod services;
pub mod users;

/// `{ "status": true }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOutput {
    pub status: bool,
}

impl StatusOutput {
    pub const SUCCESS: Self = Self { status: true };
}

pub(crate) async fn hash_password(deps: &AppDeps, plain: &str) -> DomainResult<String> {
    let hasher = deps.hasher.clone();
    let plain = plain.to_string();
    tokio::task::spawn_blocking(move || hasher.hash(&plain))
        .await
        .map_err(|e| DomainError::internal(format!("password hashing task failed: {e}")))?
}

pub(crate) async fn verify_password(deps: &AppDeps, plain: &str, hash: &str) -> DomainResult<bool> {
    let hasher = deps.hasher.clone();
    let (plain, hash) = (plain.to_string(), hash.to_string());
    tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
        .await
        .map_err(|e| DomainError::internal(format!("password verification task failed: {e}")))?
}
