use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// A named notification describing a completed state change.
///
/// Events are not persisted; they live only for the duration of dispatch.
/// The payload is opaque to the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    name: String,
    payload: JsonValue,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Stable event name (e.g. "auth.signed_up").
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    /// Deserialize the payload (or a part of it) into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}
