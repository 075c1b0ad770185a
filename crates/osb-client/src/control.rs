//! Control-channel engine: the HTTP long-polling state machine.
//!
//! The engine POSTs to the control endpoint and blocks until the server has
//! an RPC to deliver. Each decoded request goes through the dispatcher and
//! its framed response rides as the body of the next poll. The first poll
//! (and the first poll after any per-message decode failure) carries
//! `reset=1`, telling the server to discard in-flight request state and
//! re-send from a clean point.
//!
//! The engine runs as an independent task per session and terminates on
//! transport errors, on fatal framing (no frame boundary), or on the
//! session's cancellation token ([`ClientError::Interrupted`]).

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use osb_proto::{decode_frame, FrameError, CONTENT_TYPE_JSON};

use crate::config::MAX_RESPONSE_BYTES;
use crate::dispatch::ServiceRegistry;
use crate::errors::ClientError;
use crate::http::{read_body_capped, HttpClient};
use crate::listener::SessionListener;

/// One session's control channel.
pub(crate) struct ControlChannel {
    pub http: HttpClient,
    /// Control endpoint with `session_id` already applied, without `reset`.
    pub control_url: Url,
    pub session_id: String,
    pub listener: Option<Arc<dyn SessionListener>>,
    pub registry: ServiceRegistry,
    pub cancel: CancellationToken,
}

impl ControlChannel {
    /// Long-poll until cancelled or a fatal channel error occurs.
    pub async fn run(self) -> Result<(), ClientError> {
        let mut reset = true;
        let mut post_body = Bytes::new();

        loop {
            let mut url = self.control_url.clone();
            if reset {
                url.query_pairs_mut().append_pair("reset", "1");
                reset = false;
            }

            let resp = self.http.post(url, post_body.clone(), &self.cancel).await?;

            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned();
            if content_type != CONTENT_TYPE_JSON {
                return Err(ClientError::ContentType {
                    found: content_type,
                });
            }

            let body = read_body_capped(resp, MAX_RESPONSE_BYTES, &self.cancel).await?;

            let frame = match decode_frame(&body) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    // Server keep-alive; poll again without piggybacking a
                    // response.
                    debug!(session_id = %self.session_id, "control channel keep-alive");
                    post_body = Bytes::new();
                    continue;
                }
                Err(err @ FrameError::MissingBoundary) => {
                    return Err(err.into());
                }
                Err(err) => {
                    // Per-message failure: ask the server to re-send from a
                    // clean point on the next poll.
                    warn!(session_id = %self.session_id, %err, "dropping undecodable control message");
                    reset = true;
                    post_body = Bytes::new();
                    continue;
                }
            };

            post_body = self
                .registry
                .dispatch(&frame, self.listener.as_deref())
                .await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_support::TestListener;
    use osb_proto::encode_frame;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Replies with a fixed sequence of bodies, then keep-alives forever.
    struct Sequence {
        bodies: Mutex<VecDeque<Vec<u8>>>,
    }

    impl Sequence {
        fn new(bodies: Vec<Vec<u8>>) -> Self {
            Self {
                bodies: Mutex::new(bodies.into()),
            }
        }
    }

    impl Respond for Sequence {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let body = self.bodies.lock().pop_front().unwrap_or_else(|| b"\n\n".to_vec());
            ResponseTemplate::new(200).set_body_raw(body, CONTENT_TYPE_JSON)
        }
    }

    fn request_frame(header: Value) -> Vec<u8> {
        let Value::Object(map) = header else {
            panic!("expected object")
        };
        encode_frame(map, None).to_vec()
    }

    async fn spawn_channel(
        server: &MockServer,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> (CancellationToken, tokio::task::JoinHandle<Result<(), ClientError>>) {
        let cancel = CancellationToken::new();
        let channel = ControlChannel {
            http: HttpClient::new(&ClientConfig::default()).unwrap(),
            control_url: Url::parse(&format!(
                "{}/osb/session/control?session_id=s1",
                server.uri()
            ))
            .unwrap(),
            session_id: "s1".to_owned(),
            listener,
            registry: ServiceRegistry::with_builtin(),
            cancel: cancel.clone(),
        };
        (cancel.clone(), tokio::spawn(channel.run()))
    }

    async fn wait_for_polls(server: &MockServer, count: usize) {
        for _ in 0..200 {
            if server.received_requests().await.unwrap_or_default().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("server never saw {count} polls");
    }

    fn poll_reset_flags(requests: &[Request]) -> Vec<bool> {
        requests
            .iter()
            .map(|r| r.url.query_pairs().any(|(k, v)| k == "reset" && v == "1"))
            .collect()
    }

    #[tokio::test]
    async fn happy_path_poll_and_respond() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/osb/session/control"))
            .respond_with(Sequence::new(vec![request_frame(json!({
                "service": "getDuration", "requestId": "r1", "instanceId": "i1",
            }))]))
            .mount(&server)
            .await;

        let listener = Arc::new(TestListener::with_duration(42.5));
        let (cancel, handle) = spawn_channel(&server, Some(listener.clone())).await;
        wait_for_polls(&server, 2).await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(result.unwrap_err().is_interrupted());

        assert_eq!(listener.calls.lock().as_slice(), ["getDuration"]);

        let requests = server.received_requests().await.unwrap();
        // First poll resets with an empty body; second carries the response.
        assert!(poll_reset_flags(&requests)[0]);
        assert!(!poll_reset_flags(&requests)[1]);
        assert!(requests[0].body.is_empty());

        let frame = decode_frame(&requests[1].body).unwrap().unwrap();
        assert_eq!(frame.header["requestId"], "r1");
        assert_eq!(frame.header["result"], "OK");
        assert_eq!(frame.header["message"], "");
        assert_eq!(frame.header["duration"], "42.5");
        assert!(frame.payload.is_none());
    }

    #[tokio::test]
    async fn keep_alive_produces_no_listener_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(Sequence::new(vec![]))
            .mount(&server)
            .await;

        let listener = Arc::new(TestListener::default());
        let (cancel, handle) = spawn_channel(&server, Some(listener.clone())).await;
        wait_for_polls(&server, 3).await;
        cancel.cancel();
        let _ = handle.await.unwrap();

        assert!(listener.calls.lock().is_empty());
        let requests = server.received_requests().await.unwrap();
        // Every poll after a keep-alive has an empty body and no reset flag.
        assert!(requests[1].body.is_empty());
        assert!(requests[2].body.is_empty());
        let flags = poll_reset_flags(&requests);
        assert!(flags[0]);
        assert!(!flags[1]);
        assert!(!flags[2]);
    }

    #[tokio::test]
    async fn field_parse_failure_answers_error_and_continues() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(Sequence::new(vec![request_frame(json!({
                "service": "seek", "requestId": "r2", "instanceId": "i1", "time": "NaNx",
            }))]))
            .mount(&server)
            .await;

        let listener = Arc::new(TestListener::default());
        let (cancel, handle) = spawn_channel(&server, Some(listener.clone())).await;
        wait_for_polls(&server, 3).await;
        cancel.cancel();
        let _ = handle.await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let frame = decode_frame(&requests[1].body).unwrap().unwrap();
        assert_eq!(frame.header["requestId"], "r2");
        assert_eq!(frame.header["result"], "ERROR");
        assert_eq!(frame.header["message"], "Failed to parse float: NaNx");
        // A field-level failure is not a protocol error: no reset.
        assert!(!poll_reset_flags(&requests)[1]);
        assert!(!poll_reset_flags(&requests)[2]);
    }

    #[tokio::test]
    async fn decode_failure_resets_then_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(Sequence::new(vec![
                // Declared size does not match the carried payload.
                b"{\"payloadSize\":10}\n\nabc".to_vec(),
                request_frame(json!({"service": "play", "requestId": "r3", "instanceId": "i1"})),
            ]))
            .mount(&server)
            .await;

        let listener = Arc::new(TestListener::default());
        let (cancel, handle) = spawn_channel(&server, Some(listener.clone())).await;
        wait_for_polls(&server, 4).await;
        cancel.cancel();
        let _ = handle.await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let flags = poll_reset_flags(&requests);
        assert!(flags[0], "initial poll resets");
        assert!(flags[1], "poll after decode failure resets");
        assert!(!flags[2], "successful decode clears the reset flag");
        assert!(!flags[3]);
        // The bad message produced no response body and no listener call for
        // it; the good one did.
        assert!(requests[1].body.is_empty());
        assert_eq!(listener.calls.lock().as_slice(), ["play"]);
    }

    #[tokio::test]
    async fn missing_boundary_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"{\"service\":\"play\"}".to_vec(), CONTENT_TYPE_JSON),
            )
            .mount(&server)
            .await;

        let (_cancel, handle) = spawn_channel(&server, None).await;
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Frame(FrameError::MissingBoundary)
        ));
    }

    #[tokio::test]
    async fn wrong_content_type_terminates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"\n\n".to_vec(), "text/html"))
            .mount(&server)
            .await;

        let (_cancel, handle) = spawn_channel(&server, None).await;
        let err = handle.await.unwrap().unwrap_err();
        match err {
            ClientError::ContentType { found } => assert_eq!(found, "text/html"),
            other => panic!("expected ContentType, got {other}"),
        }
    }

    #[tokio::test]
    async fn non_200_terminates_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (_cancel, handle) = spawn_channel(&server, None).await;
        let err = handle.await.unwrap().unwrap_err();
        match err {
            ClientError::Http { method, status, .. } => {
                assert_eq!(method, "POST");
                assert_eq!(status, 500);
            }
            other => panic!("expected Http, got {other}"),
        }
    }

    #[tokio::test]
    async fn cancellation_mid_poll_interrupts_quickly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"\n\n".to_vec(), CONTENT_TYPE_JSON)
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let (cancel, handle) = spawn_channel(&server, None).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_interrupted());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
