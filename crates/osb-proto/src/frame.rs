//! Framed message codec: JSON header, `"\n\n"` sentinel, optional payload.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};
use thiserror::Error;

/// Header/payload boundary between the JSON header and the binary payload.
pub const FRAME_BOUNDARY: &[u8] = b"\n\n";

/// Header key declaring the payload length in bytes.
pub const PAYLOAD_SIZE_KEY: &str = "payloadSize";

/// Errors produced while decoding a framed message.
///
/// `MissingBoundary` is fatal to the channel (no frame boundary can be
/// found); the other variants fail only the message they occurred in.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The body contains no `"\n\n"` boundary.
    #[error("message is missing the \\n\\n frame boundary")]
    MissingBoundary,

    /// The header is not valid JSON.
    #[error("invalid message header: {0}")]
    BadHeader(#[from] serde_json::Error),

    /// The header is not a JSON object.
    #[error("message header is not a JSON object")]
    HeaderNotObject,

    /// `payloadSize` is present but not a non-negative integer.
    #[error("payloadSize is not a valid byte count")]
    BadPayloadSize,

    /// Declared `payloadSize` does not match the bytes after the boundary.
    #[error("payload size mismatch: header declares {declared}, body carries {actual}")]
    SizeMismatch {
        /// Byte count from the header (0 when the key is absent).
        declared: u64,
        /// Bytes actually present after the boundary.
        actual: u64,
    },
}

/// One decoded control-channel message.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Parsed JSON header object.
    pub header: Map<String, Value>,
    /// Binary payload, present when the header declared `payloadSize`.
    pub payload: Option<Bytes>,
}

/// Encode a header and optional payload into the framed wire format.
///
/// When a payload is supplied, `payloadSize` is set on the header before
/// serialization; when it is not, any stale `payloadSize` key is removed so
/// the message ends at the boundary.
pub fn encode_frame(mut header: Map<String, Value>, payload: Option<&[u8]>) -> Bytes {
    match payload {
        Some(p) => {
            header.insert(PAYLOAD_SIZE_KEY.to_owned(), Value::from(p.len() as u64));
        }
        None => {
            header.remove(PAYLOAD_SIZE_KEY);
        }
    }

    // Serializing a Map<String, Value> cannot fail.
    let json = serde_json::to_vec(&Value::Object(header)).unwrap_or_default();

    let mut out = BytesMut::with_capacity(
        json.len() + FRAME_BOUNDARY.len() + payload.map_or(0, <[u8]>::len),
    );
    out.put_slice(&json);
    out.put_slice(FRAME_BOUNDARY);
    if let Some(p) = payload {
        out.put_slice(p);
    }
    out.freeze()
}

/// Decode one framed message from a complete body.
///
/// Returns `Ok(None)` for keep-alives: a zero-length body or a bare
/// `"\n\n"` with nothing before or after it.
pub fn decode_frame(body: &[u8]) -> Result<Option<Frame>, FrameError> {
    if body.is_empty() {
        return Ok(None);
    }

    let boundary = find_boundary(body).ok_or(FrameError::MissingBoundary)?;
    let header_bytes = &body[..boundary];
    let rest = &body[boundary + FRAME_BOUNDARY.len()..];

    if header_bytes.iter().all(u8::is_ascii_whitespace) {
        // Keep-alive. Anything after the boundary is a framing violation.
        if rest.is_empty() {
            return Ok(None);
        }
        return Err(FrameError::SizeMismatch {
            declared: 0,
            actual: rest.len() as u64,
        });
    }

    let header: Value = serde_json::from_slice(header_bytes)?;
    let Value::Object(header) = header else {
        return Err(FrameError::HeaderNotObject);
    };

    let declared = match header.get(PAYLOAD_SIZE_KEY) {
        Some(v) => Some(payload_size_value(v)?),
        None => None,
    };

    let payload = match (declared, rest.len() as u64) {
        (None, 0) => None,
        (Some(n), actual) if n == actual => Some(Bytes::copy_from_slice(rest)),
        (declared, actual) => {
            return Err(FrameError::SizeMismatch {
                declared: declared.unwrap_or(0),
                actual,
            })
        }
    };

    Ok(Some(Frame { header, payload }))
}

/// Locate the first `"\n\n"` in the body.
fn find_boundary(body: &[u8]) -> Option<usize> {
    body.windows(FRAME_BOUNDARY.len())
        .position(|w| w == FRAME_BOUNDARY)
}

/// `payloadSize` arrives as a JSON integer; tolerate a decimal string too,
/// matching the channel's numeric-as-string convention elsewhere.
fn payload_size_value(v: &Value) -> Result<u64, FrameError> {
    match v {
        Value::Number(n) => n.as_u64().ok_or(FrameError::BadPayloadSize),
        Value::String(s) => s.parse().map_err(|_| FrameError::BadPayloadSize),
        _ => Err(FrameError::BadPayloadSize),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
