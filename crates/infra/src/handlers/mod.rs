//! Event-handler feature modules.
//!
//! [`MODULES`] is the static registry walked once at startup. A module with no
//! reactions still gets an entry so the list mirrors the feature set.

use reservo_events::{BusError, FeatureModule, register_event_handlers};

use crate::deps::AppDeps;

pub mod audits;
pub mod auth;
pub mod reviews;

pub const MODULES: &[FeatureModule<AppDeps>] = &[
    FeatureModule::with_handlers("auth", auth::register),
    FeatureModule::with_handlers("audits", audits::register),
    FeatureModule::without_handlers("providers"),
    FeatureModule::with_handlers("reviews", reviews::register),
];

/// Subscribe every feature module's handlers on `deps.bus`.
pub fn register_all(deps: &AppDeps) -> Result<usize, BusError> {
    register_event_handlers(deps, MODULES)
}
