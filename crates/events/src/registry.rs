//! Feature-module handler registration.
//!
//! Each feature that reacts to events contributes a [`FeatureModule`] to a
//! static list assembled at build time. Startup walks the list once and calls
//! every module's registration entry point with the shared dependencies.

use tracing::{debug, info};

use crate::bus::BusError;

/// Registration entry point: subscribes a module's handlers using `deps`.
pub type RegisterFn<D> = fn(&D) -> Result<(), BusError>;

/// A named feature module and its (optional) registration entry point.
pub struct FeatureModule<D> {
    pub name: &'static str,
    pub register: Option<RegisterFn<D>>,
}

impl<D> FeatureModule<D> {
    pub const fn with_handlers(name: &'static str, register: RegisterFn<D>) -> Self {
        Self {
            name,
            register: Some(register),
        }
    }

    pub const fn without_handlers(name: &'static str) -> Self {
        Self {
            name,
            register: None,
        }
    }
}

impl<D> Clone for FeatureModule<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            register: self.register,
        }
    }
}

impl<D> core::fmt::Debug for FeatureModule<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeatureModule")
            .field("name", &self.name)
            .field("has_handlers", &self.register.is_some())
            .finish()
    }
}

/// Run every module's registration entry point in list order.
///
/// Modules without an entry point are skipped. Returns how many modules
/// registered handlers; the first registration error aborts startup.
pub fn register_event_handlers<D>(deps: &D, modules: &[FeatureModule<D>]) -> Result<usize, BusError> {
    let mut registered = 0;

    for module in modules {
        let Some(register) = module.register else {
            debug!(module = module.name, "feature module has no event handlers; skipped");
            continue;
        };

        register(deps)?;
        registered += 1;
        debug!(module = module.name, "feature module event handlers registered");
    }

    info!(modules = modules.len(), registered, "event handlers registered");
    Ok(registered)
}
