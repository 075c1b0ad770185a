//! Decoded control-channel request header.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::fields::{self, FieldError};

/// Header of one server→client RPC.
///
/// The server sends every value as a string (numbers included); each service
/// handler parses the fields it needs and reports parse failures per
/// request. Unknown fields are ignored so newer servers stay compatible.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlRequest {
    pub session_id: String,
    pub request_id: String,
    pub instance_id: String,
    pub service: String,

    // Playback / browser
    pub url: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub time: Option<String>,
    pub rate: Option<String>,
    pub volume: Option<String>,
    pub visible: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,

    // MSE
    pub source_id: Option<String>,
    pub mime_type: Option<String>,
    pub append_window_start: Option<String>,
    pub append_window_end: Option<String>,
    pub buffer_id: Option<String>,
    pub buffer_offset: Option<String>,
    pub buffer_length: Option<String>,
    pub mode: Option<String>,
    pub timestamp_offset: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,

    // EME
    pub key_system: Option<String>,
    pub supported_configurations: Option<Value>,
    pub security_origin: Option<String>,
    pub allow_distinctive_identifier: Option<String>,
    pub allow_persistent_state: Option<String>,
    pub cdm_id: Option<String>,
    pub cdm_session_id: Option<String>,
    pub session_type: Option<String>,
    pub init_data_type: Option<String>,
    pub event_instance_id: Option<String>,

    // Resources
    pub method: Option<String>,
    pub headers: Option<String>,
    pub resource_id: Option<String>,
    pub byte_range: Option<String>,
    pub sequence_number: Option<String>,
}

impl ControlRequest {
    /// Parse a request header from the decoded frame header object.
    pub fn from_header(header: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(header.clone()))
    }
}

/// Byte range of a `loadResource` request, parsed from `"start-end"`.
///
/// The end is open (`"100-"`) when the request wants everything from
/// `start` onward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Parse the `"start-end"` wire form.
    pub fn parse(s: &str) -> Result<Self, FieldError> {
        let Some((start, end)) = s.split_once('-') else {
            return Err(FieldError::ByteRange(s.to_owned()));
        };
        let start = fields::parse_uint(start).map_err(|_| FieldError::ByteRange(s.to_owned()))?;
        let end = if end.is_empty() {
            None
        } else {
            Some(fields::parse_uint(end).map_err(|_| FieldError::ByteRange(s.to_owned()))?)
        };
        Ok(Self { start, end })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn parse_minimal_request() {
        let req = ControlRequest::from_header(&header(json!({
            "service": "getDuration",
            "requestId": "r1",
            "instanceId": "i1",
        })))
        .unwrap();
        assert_eq!(req.service, "getDuration");
        assert_eq!(req.request_id, "r1");
        assert_eq!(req.instance_id, "i1");
        assert!(req.time.is_none());
    }

    #[test]
    fn parse_request_with_service_fields() {
        let req = ControlRequest::from_header(&header(json!({
            "service": "setRect",
            "requestId": "r2",
            "x": "0", "y": "0", "width": "1280", "height": "720",
        })))
        .unwrap();
        assert_eq!(req.width.as_deref(), Some("1280"));
        assert_eq!(req.height.as_deref(), Some("720"));
    }

    #[test]
    fn parse_ignores_unknown_fields() {
        let req = ControlRequest::from_header(&header(json!({
            "service": "play",
            "requestId": "r3",
            "futureField": "whatever",
        })))
        .unwrap();
        assert_eq!(req.service, "play");
    }

    #[test]
    fn parse_append_window_fields() {
        let req = ControlRequest::from_header(&header(json!({
            "service": "appendBuffer",
            "sourceId": "sb0",
            "appendWindowStart": "0",
            "appendWindowEnd": "inf",
        })))
        .unwrap();
        assert_eq!(req.append_window_end.as_deref(), Some("inf"));
    }

    // ── ByteRange ───────────────────────────────────────────────────

    #[test]
    fn byte_range_closed() {
        assert_eq!(
            ByteRange::parse("100-200").unwrap(),
            ByteRange {
                start: 100,
                end: Some(200)
            }
        );
    }

    #[test]
    fn byte_range_open_ended() {
        assert_eq!(
            ByteRange::parse("100-").unwrap(),
            ByteRange {
                start: 100,
                end: None
            }
        );
    }

    #[test]
    fn byte_range_rejects_garbage() {
        assert!(ByteRange::parse("100").is_err());
        assert!(ByteRange::parse("a-b").is_err());
        assert_eq!(
            ByteRange::parse("x-1").unwrap_err().to_string(),
            "Failed to parse byte range: x-1"
        );
    }
}
