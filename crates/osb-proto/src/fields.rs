//! Parsing and formatting for the channel's string-typed fields.
//!
//! All numbers travel as decimal strings. `"inf"` and `"-inf"` are legal
//! where noted (MSE append windows). Booleans are `"1" | "yes" | "true"` on
//! input and `"1" | "0"` on output. Parse failures carry the offending token
//! so the error text can be echoed to the server verbatim.

use thiserror::Error;

/// A field failed to parse. The message is what goes back on the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("Failed to parse float: {0}")]
    Float(String),

    #[error("Failed to parse integer: {0}")]
    Integer(String),

    #[error("Failed to parse byte range: {0}")]
    ByteRange(String),
}

/// Parse a decimal float field.
pub fn parse_float(s: &str) -> Result<f64, FieldError> {
    s.parse().map_err(|_| FieldError::Float(s.to_owned()))
}

/// Parse a float field that additionally accepts the `"inf"`/`"-inf"`
/// sentinels used by the MSE append window bounds.
pub fn parse_float_inf(s: &str) -> Result<f64, FieldError> {
    match s {
        "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        other => parse_float(other),
    }
}

/// Parse an unsigned decimal integer field.
pub fn parse_uint(s: &str) -> Result<u64, FieldError> {
    s.parse().map_err(|_| FieldError::Integer(s.to_owned()))
}

/// Parse a signed decimal integer field.
pub fn parse_int(s: &str) -> Result<i64, FieldError> {
    s.parse().map_err(|_| FieldError::Integer(s.to_owned()))
}

/// Parse an unsigned decimal integer that must fit in 32 bits
/// (pixel coordinates and dimensions).
pub fn parse_u32(s: &str) -> Result<u32, FieldError> {
    s.parse().map_err(|_| FieldError::Integer(s.to_owned()))
}

/// Wire booleans: `"1"`, `"yes"` and `"true"` are true, anything else false.
pub fn parse_bool(s: &str) -> bool {
    matches!(s, "1" | "yes" | "true")
}

/// Format a boolean for the wire.
pub fn format_bool(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

/// Format a float for the wire, preserving the infinity sentinels.
pub fn format_float(v: f64) -> String {
    if v == f64::INFINITY {
        "inf".to_owned()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_owned()
    } else {
        // Shortest representation that round-trips, like the reference
        // server expects (no forced decimal point).
        let mut s = format!("{v}");
        if s == "-0" {
            s = "0".to_owned();
        }
        s
    }
}

/// Format a float slice as the comma-joined list used by range replies.
pub fn format_float_list(vs: &[f64]) -> String {
    vs.iter()
        .map(|v| format_float(*v))
        .collect::<Vec<_>>()
        .join(",")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
