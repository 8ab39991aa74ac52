//! Infrastructure layer: store, config, mailer, orchestrators, event handlers.

pub mod config;
pub mod deps;
pub mod handlers;
pub mod mailer;
pub mod mutations;
pub mod session;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use deps::AppDeps;
