//! RPC dispatcher: wire service name → listener call → framed response.
//!
//! A data-driven service table maps each wire service string to a handler.
//! Handlers parse the request's string-typed fields into typed arguments
//! (reporting parse failures as `ERROR` responses on that request only),
//! invoke the listener, and marshal the typed result back into response
//! fields and an optional binary payload.
//!
//! When no listener is attached (test mode) every service answers `OK` with
//! default-valued fields.

mod browser;
mod eme;
mod mse;
mod playback;
mod queries;
mod resources;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use osb_proto::fields::FieldError;
use osb_proto::{ControlRequest, Frame, ResponseBuilder};

use crate::listener::{ListenerError, SessionListener};

/// Everything a handler needs for one request.
pub struct ServiceCall<'a> {
    pub req: &'a ControlRequest,
    /// Binary payload of the frame, empty when none was carried.
    pub payload: &'a [u8],
    /// Absent in test mode; handlers then answer with defaults.
    pub listener: Option<&'a dyn SessionListener>,
}

/// Per-request dispatch failure; the display text goes back on the wire.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Invalid append mode: {0}")]
    InvalidAppendMode(String),

    #[error("Invalid session type: {0}")]
    InvalidSessionType(String),

    /// Listener error text, propagated verbatim.
    #[error("{0}")]
    Listener(String),
}

impl From<ListenerError> for ServiceError {
    fn from(err: ListenerError) -> Self {
        Self::Listener(err.0)
    }
}

/// Successful handler output: response fields plus an optional payload.
#[derive(Debug, Default)]
pub struct ServiceReply {
    pub fields: Map<String, Value>,
    pub payload: Option<Bytes>,
}

impl ServiceReply {
    /// Reply with no service-specific fields.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a string-valued field.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_owned(), Value::from(value.into()));
        self
    }

    /// Add a structured JSON field.
    pub fn json_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_owned(), value);
        self
    }

    /// Attach a binary payload.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// One entry in the service table.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError>;
}

/// The service table. Built once per session and shared by the
/// control-channel task.
pub struct ServiceRegistry {
    handlers: HashMap<&'static str, Box<dyn ServiceHandler>>,
}

impl ServiceRegistry {
    /// Build the registry with the full built-in service catalog.
    pub fn with_builtin() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };

        playback::register(&mut registry);
        queries::register(&mut registry);
        mse::register(&mut registry);
        eme::register(&mut registry);
        resources::register(&mut registry);
        browser::register(&mut registry);

        registry
    }

    pub(crate) fn register(&mut self, service: &'static str, handler: impl ServiceHandler + 'static) {
        let _ = self.handlers.insert(service, Box::new(handler));
    }

    /// Registered service names (sorted), mostly for diagnostics.
    pub fn services(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Process one decoded frame and produce the framed response bytes that
    /// will ride the next poll.
    pub async fn dispatch(
        &self,
        frame: &Frame,
        listener: Option<&dyn SessionListener>,
    ) -> Bytes {
        let req = match ControlRequest::from_header(&frame.header) {
            Ok(req) => req,
            Err(err) => {
                warn!(%err, "malformed control request header");
                let request_id = frame
                    .header
                    .get("requestId")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                return ResponseBuilder::new(request_id)
                    .fail(format!("Malformed request header: {err}"))
                    .encode();
            }
        };

        let builder = ResponseBuilder::new(&req.request_id);
        let Some(handler) = self.handlers.get(req.service.as_str()) else {
            let err = ServiceError::UnknownService(req.service.clone());
            warn!(service = %req.service, "unknown control channel service");
            return builder.fail(err.to_string()).encode();
        };

        let call = ServiceCall {
            req: &req,
            payload: frame.payload.as_deref().unwrap_or_default(),
            listener,
        };

        match handler.handle(&call).await {
            Ok(reply) => {
                let mut builder = builder;
                for (key, value) in reply.fields {
                    builder = builder.json_field(&key, value);
                }
                if let Some(payload) = reply.payload {
                    builder = builder.payload(payload);
                }
                builder.encode()
            }
            Err(err) => {
                warn!(service = %req.service, %err, "control request failed");
                builder.fail(err.to_string()).encode()
            }
        }
    }
}

/// String field access mirroring the wire's "absent means empty" rule:
/// a missing field parses like an empty string, so numeric parsing of a
/// missing field reports the empty token.
pub(crate) fn text(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
