//! Process-wide event bus (publish/subscribe with a worker pool).
//!
//! ## Dispatch model
//!
//! The bus owns a bounded queue of `(event, handler)` dispatches and a pool of
//! workers draining it:
//!
//! ```text
//! publish(name, payload) ──> one dispatch per registered handler ──> queue
//!                                                                      │
//!                                         worker 0 … worker N-1  <─────┘
//!                                              │
//!                                  handler.handle(event) ── Err / panic ──> FailureSink
//! ```
//!
//! - `publish` returns once every handler for the event has been *scheduled*
//!   (it waits for queue capacity), never for handler completion.
//! - Dispatches are enqueued in registration order. With more than one worker,
//!   handlers may complete in any order.
//! - A failing or panicking handler is reported to the sink and does not affect
//!   the other handlers, the workers, or the publisher.
//!
//! ## Registry
//!
//! Handlers are registered at process start and read on every publish. The
//! registry is a plain `RwLock`; late registration works but is not a hot path.
//! Each event name accepts at most `max_handlers_per_event` handlers; exceeding
//! it is an error, not a silent drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::event::DomainEvent;
use crate::handler::EventHandler;
use crate::sink::{FailureSink, HandlerFailure};

/// Event bus sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Number of worker tasks draining the dispatch queue.
    pub workers: usize,
    /// Bounded queue length; publishers wait when it is full.
    pub queue_capacity: usize,
    /// Registration ceiling per event name.
    pub max_handlers_per_event: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            max_handlers_per_event: 100,
        }
    }
}

impl EventBusConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_handlers_per_event(mut self, max: usize) -> Self {
        self.max_handlers_per_event = max;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("event '{event_name}' already has the maximum of {limit} handlers")]
    TooManyHandlers { event_name: String, limit: usize },

    #[error("handler registry lock poisoned")]
    Poisoned,
}

struct Dispatch {
    event: Arc<DomainEvent>,
    handler: Arc<dyn EventHandler>,
}

type Registry = HashMap<String, Vec<Arc<dyn EventHandler>>>;

/// In-process publish/subscribe dispatcher.
///
/// Create it with [`EventBus::start`] from inside a Tokio runtime; share the
/// returned `Arc` with every publisher and registration entry point.
pub struct EventBus {
    config: EventBusConfig,
    registry: RwLock<Registry>,
    queue: Mutex<Option<mpsc::Sender<Dispatch>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Arc<watch::Sender<usize>>,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("event_names", &self.event_names())
            .field("pending", &*self.pending.borrow())
            .finish()
    }
}

impl EventBus {
    /// Spawn the worker pool and return the shared bus.
    pub fn start(config: EventBusConfig, sink: Arc<dyn FailureSink>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Dispatch>(config.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);

        let workers = (0..config.workers.max(1))
            .map(|worker| tokio::spawn(worker_loop(worker, rx.clone(), sink.clone(), pending.clone())))
            .collect();

        info!(
            workers = config.workers.max(1),
            queue_capacity = config.queue_capacity,
            max_handlers_per_event = config.max_handlers_per_event,
            "event bus started"
        );

        Arc::new(Self {
            config,
            registry: RwLock::new(HashMap::new()),
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            pending,
        })
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Register `handler` for `event_name`.
    pub fn subscribe(
        &self,
        event_name: impl Into<String>,
        handler: impl EventHandler,
    ) -> Result<(), BusError> {
        let event_name = event_name.into();
        let limit = self.config.max_handlers_per_event;

        let mut registry = self.registry.write().map_err(|_| BusError::Poisoned)?;
        let handlers = registry.entry(event_name.clone()).or_default();
        if handlers.len() >= limit {
            return Err(BusError::TooManyHandlers { event_name, limit });
        }
        handlers.push(Arc::new(handler));

        debug!(event_name = %event_name, handlers_count = handlers.len(), "event handler registered");
        Ok(())
    }

    /// Remove every handler registered for `event_name`.
    pub fn unsubscribe_all(&self, event_name: &str) {
        let removed = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event_name)
            .map(|handlers| handlers.len())
            .unwrap_or(0);

        debug!(event_name, removed, "event handlers removed");
    }

    /// Names with at least one registered handler, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = registry
            .iter()
            .filter(|(_, handlers)| !handlers.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn handler_count(&self, event_name: &str) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Schedule every handler registered for `event_name`.
    ///
    /// Returns the number of handlers scheduled. Handler outcomes are not
    /// observable here; failures go to the failure sink.
    pub async fn publish(&self, event_name: &str, payload: JsonValue) -> usize {
        let handlers = self.handlers_for(event_name);
        info!(event_name, handlers_count = handlers.len(), payload = %payload, "publishing event");

        if handlers.is_empty() {
            return 0;
        }

        let Some(queue) = self.queue.lock().unwrap_or_else(PoisonError::into_inner).clone() else {
            warn!(event_name, "event bus is shut down; event dropped");
            return 0;
        };

        let event = Arc::new(DomainEvent::new(event_name, payload));
        let mut scheduled = 0;
        for handler in handlers {
            self.pending.send_modify(|n| *n += 1);
            let dispatch = Dispatch {
                event: event.clone(),
                handler,
            };
            if queue.send(dispatch).await.is_err() {
                self.pending.send_modify(|n| *n = n.saturating_sub(1));
                warn!(event_name, scheduled, "event bus queue closed while scheduling");
                break;
            }
            scheduled += 1;
        }

        scheduled
    }

    /// Wait until every scheduled dispatch has finished (successfully or not).
    pub async fn idle(&self) {
        let mut pending = self.pending.subscribe();
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    /// Stop accepting events, drain the queue and join the workers.
    ///
    /// Publishing after shutdown logs and drops the event.
    pub async fn shutdown(&self) {
        drop(self.queue.lock().unwrap_or_else(PoisonError::into_inner).take());

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            let _ = worker.await;
        }

        info!("event bus stopped");
    }

    fn handlers_for(&self, event_name: &str) -> Vec<Arc<dyn EventHandler>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_name)
            .cloned()
            .unwrap_or_default()
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Dispatch>>>,
    sink: Arc<dyn FailureSink>,
    pending: Arc<watch::Sender<usize>>,
) {
    loop {
        let next = { queue.lock().await.recv().await };
        let Some(dispatch) = next else {
            break;
        };

        run_dispatch(dispatch, sink.as_ref()).await;
        pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    debug!(worker, "event bus worker stopped");
}

async fn run_dispatch(dispatch: Dispatch, sink: &dyn FailureSink) {
    let Dispatch { event, handler } = dispatch;

    // Own task per handler: a panic unwinds that task only.
    let task_event = event.clone();
    let outcome = tokio::spawn(async move { handler.handle(task_event).await }).await;

    let cause = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => format!("{err:#}"),
        Err(join) if join.is_panic() => format!("handler panicked: {}", panic_message(join.into_panic())),
        Err(join) => format!("handler task cancelled: {join}"),
    };

    sink.report(HandlerFailure {
        event_name: event.name().to_string(),
        payload: event.payload().clone(),
        cause,
    });
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
