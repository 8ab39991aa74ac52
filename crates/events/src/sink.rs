//! Side channel for handler failures.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value as JsonValue;

/// A captured handler failure: which event, with which payload, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerFailure {
    pub event_name: String,
    pub payload: JsonValue,
    pub cause: String,
}

/// Receives every handler failure the bus absorbs.
pub trait FailureSink: Send + Sync + 'static {
    fn report(&self, failure: HandlerFailure);
}

/// Default sink: one structured `error` record per failure.
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn report(&self, failure: HandlerFailure) {
        tracing::error!(
            event_name = %failure.event_name,
            payload = %failure.payload,
            error = %failure.cause,
            "event handler failed"
        );
    }
}

/// Sink that keeps failures in memory (tests/diagnostics).
#[derive(Debug, Default)]
pub struct RecordingSink {
    failures: Mutex<Vec<HandlerFailure>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<HandlerFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FailureSink for RecordingSink {
    fn report(&self, failure: HandlerFailure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}
