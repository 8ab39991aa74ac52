//! `reservo-events`: in-process domain event publish/subscribe.
//!
//! Mutation code publishes named events after its store writes commit;
//! independently registered handlers consume them on a worker pool. Handler
//! failures are absorbed here and reported through a [`FailureSink`], never to
//! the publisher.

pub mod bus;
pub mod event;
pub mod handler;
pub mod registry;
pub mod sink;

pub use bus::{BusError, EventBus, EventBusConfig};
pub use event::DomainEvent;
pub use handler::{EventHandler, FnHandler, HandlerResult, handler_fn};
pub use registry::{FeatureModule, RegisterFn, register_event_handlers};
pub use sink::{FailureSink, HandlerFailure, RecordingSink, TracingFailureSink};
