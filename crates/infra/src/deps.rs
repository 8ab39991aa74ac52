use std::sync::Arc;

use reservo_auth::{BcryptHasher, Hs256Signer, OsRandom, PasswordHasher, RandomSource, TokenLifecycleService};
use reservo_core::{Clock, SystemClock};
use reservo_events::{EventBus, FailureSink};

use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::store::Store;

/// Shared dependency set handed to orchestrators and handler registration.
#[derive(Clone)]
pub struct AppDeps {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub bus: Arc<EventBus>,
    pub tokens: Arc<TokenLifecycleService>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub random: Arc<dyn RandomSource>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for AppDeps {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppDeps")
            .field("bus", &self.bus)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AppDeps {
    /// Production wiring: HS256 signers, bcrypt, OS randomness, system clock.
    ///
    /// Starts the event bus, so it must run inside a Tokio runtime. Handlers
    /// are not registered here; see [`crate::handlers::register_all`].
    pub fn build(
        config: AppConfig,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        failure_sink: Arc<dyn FailureSink>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let random: Arc<dyn RandomSource> = Arc::new(OsRandom);

        let tokens = TokenLifecycleService::new(
            Arc::new(Hs256Signer::new(
                "access",
                &config.access_token_secret,
                config.access_token_ttl,
            )),
            Arc::new(Hs256Signer::new(
                "refresh",
                &config.refresh_token_secret,
                config.refresh_token_ttl,
            )),
            random.clone(),
            clock.clone(),
        );

        Self {
            bus: EventBus::start(config.event_bus.clone(), failure_sink),
            hasher: Arc::new(BcryptHasher::new(config.bcrypt_cost)),
            tokens: Arc::new(tokens),
            config: Arc::new(config),
            store,
            random,
            mailer,
            clock,
        }
    }
}
