//! Control-channel response construction.
//!
//! Every request is answered with `{requestId, result, message, …}` in the
//! framed format. `result` is `"OK"` with an empty message on success (the
//! `sendMessage` reply may override the message field) or `"ERROR"` with the
//! error text.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::frame::encode_frame;

/// Builder for one framed response message.
#[derive(Clone, Debug, Default)]
pub struct ResponseBuilder {
    fields: Map<String, Value>,
    payload: Option<Bytes>,
    error: Option<String>,
}

impl ResponseBuilder {
    /// Start a response for the given request id.
    pub fn new(request_id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("requestId".to_owned(), Value::from(request_id));
        Self {
            fields,
            payload: None,
            error: None,
        }
    }

    /// Add a string-valued service field.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_owned(), Value::from(value.into()));
        self
    }

    /// Add a raw JSON service field (used for structured EME replies).
    pub fn json_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_owned(), value);
        self
    }

    /// Attach a binary payload; `payloadSize` is filled in on encode.
    pub fn payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Mark the response as failed. The error text becomes `message` and any
    /// payload is dropped.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Encode into the framed wire format.
    pub fn encode(mut self) -> Bytes {
        match self.error {
            Some(message) => {
                self.fields.insert("result".to_owned(), Value::from("ERROR"));
                self.fields.insert("message".to_owned(), Value::from(message));
                encode_frame(self.fields, None)
            }
            None => {
                self.fields.insert("result".to_owned(), Value::from("OK"));
                self.fields
                    .entry("message".to_owned())
                    .or_insert_with(|| Value::from(""));
                encode_frame(self.fields, self.payload.as_deref())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
