//! Client-side error taxonomy.
//!
//! Per-message protocol errors never reach this enum; the dispatcher
//! converts them into `ERROR` responses on the channel. What's here is what
//! terminates an operation or a background task: transport failures, fatal
//! framing, lifecycle misuse, and cooperative cancellation.

use thiserror::Error;

use osb_proto::FrameError;

/// Errors surfaced by session APIs and background tasks.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation was cancelled by a shutdown signal. Expected during
    /// `SessionStop`; not a failure.
    #[error("interrupted")]
    Interrupted,

    /// The server answered with a non-200 status.
    #[error("{method} {url} failed with status {status}")]
    Http {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// The transport failed (TLS, DNS, connection reset, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The control channel answered with an unexpected content type.
    #[error("invalid response content type: {found}")]
    ContentType { found: String },

    /// A fully-buffered body exceeded the response size cap.
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The channel could not find a frame boundary (fatal framing).
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The session start response did not contain a session id.
    #[error("session start response carried no session id")]
    StartResponse,

    /// UI streaming needs a listener to deliver frames to.
    #[error("session has no listener attached")]
    NoListener,

    /// `ui_stream_start` while a UI stream is running.
    #[error("UI is already streaming")]
    UiAlreadyStreaming,

    /// `ui_stream_stop` without a running UI stream.
    #[error("UI is not streaming")]
    UiNotStreaming,

    /// The requested UI format cannot be pulled by the built-in pipeline.
    #[error("unsupported UI stream format: {format}")]
    UnsupportedFormat { format: String },

    /// `send_event` with an event type outside {key, keydown, keyup, click}.
    #[error("Invalid event type: {0}")]
    InvalidEventType(String),

    /// No session registered under this id.
    #[error("no session with id '{0}'")]
    SessionNotFound(String),

    /// A URL could not be parsed or joined.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether this error is the cooperative-cancellation signal.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_names_method_url_status() {
        let err = ClientError::Http {
            method: "POST",
            url: "https://osb.example.com/osb/session/control".into(),
            status: 502,
        };
        let text = err.to_string();
        assert!(text.contains("POST"));
        assert!(text.contains("/osb/session/control"));
        assert!(text.contains("502"));
    }

    #[test]
    fn exclusive_streaming_messages() {
        assert_eq!(
            ClientError::UiAlreadyStreaming.to_string(),
            "UI is already streaming"
        );
        assert_eq!(ClientError::UiNotStreaming.to_string(), "UI is not streaming");
    }

    #[test]
    fn invalid_event_type_echoes_token() {
        assert_eq!(
            ClientError::InvalidEventType("hover".into()).to_string(),
            "Invalid event type: hover"
        );
    }

    #[test]
    fn interrupted_is_flagged() {
        assert!(ClientError::Interrupted.is_interrupted());
        assert!(!ClientError::StartResponse.is_interrupted());
    }
}
