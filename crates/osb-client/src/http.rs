//! Cookie-jar-aware HTTP execution with cancellation-by-abort.
//!
//! One `HttpClient` exists per session. It owns the session's cookie jar
//! (the load-balancer affinity token) and wraps every request in a race
//! against the caller's cancellation token: when the token fires first the
//! in-flight future is dropped, which aborts the request at the transport
//! layer, and the operation returns [`ClientError::Interrupted`].

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

use osb_proto::CONTENT_TYPE_JSON;

use crate::config::{ClientConfig, MAX_RESPONSE_BYTES};
use crate::errors::ClientError;

/// HTTP transport shared by all requests of one session.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl HttpClient {
    /// Build a client with a fresh cookie jar.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .cookie_provider(Arc::clone(&jar))
            .build()?;
        Ok(Self { client, jar })
    }

    /// The cookies the jar would attach to `url`, as `name=value` pairs.
    pub fn cookies_for(&self, url: &Url) -> Vec<String> {
        match self.jar.cookies(url) {
            Some(header) => header
                .to_str()
                .unwrap_or_default()
                .split("; ")
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            None => Vec::new(),
        }
    }

    /// GET a URL and buffer the full body (capped at [`MAX_RESPONSE_BYTES`]).
    pub async fn get(&self, url: Url, cancel: &CancellationToken) -> Result<Bytes, ClientError> {
        let resp = self.get_stream(url, cancel).await?;
        read_body_capped(resp, MAX_RESPONSE_BYTES, cancel).await
    }

    /// GET a URL and hand back the open response for streaming reads.
    pub async fn get_stream(
        &self,
        url: Url,
        cancel: &CancellationToken,
    ) -> Result<Response, ClientError> {
        let builder = self.client.get(url.clone());
        execute("GET", url, builder, cancel).await
    }

    /// POST a `text/json` body and hand back the open response.
    pub async fn post(
        &self,
        url: Url,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> Result<Response, ClientError> {
        let builder = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(body);
        execute("POST", url, builder, cancel).await
    }
}

/// Send a request, racing it against the cancellation token. Non-200
/// statuses close the body and return an error naming method, URL and
/// status.
async fn execute(
    method: &'static str,
    url: Url,
    builder: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response, ClientError> {
    let resp = tokio::select! {
        () = cancel.cancelled() => return Err(ClientError::Interrupted),
        resp = builder.send() => resp?,
    };

    let status = resp.status();
    if !status.is_success() {
        return Err(ClientError::Http {
            method,
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp)
}

/// Read a response body to completion, enforcing a byte cap and racing the
/// cancellation token. The response is consumed; dropping it on any exit
/// path closes the connection exactly once.
pub(crate) async fn read_body_capped(
    resp: Response,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Bytes, ClientError> {
    let mut stream = resp.bytes_stream();
    let mut buf = BytesMut::new();
    loop {
        tokio::select! {
            () = cancel.cancelled() => return Err(ClientError::Interrupted),
            chunk = stream.next() => match chunk {
                Some(Ok(chunk)) => {
                    if buf.len() + chunk.len() > limit {
                        return Err(ClientError::BodyTooLarge { limit });
                    }
                    buf.extend_from_slice(&chunk);
                }
                Some(Err(err)) => {
                    if cancel.is_cancelled() {
                        return Err(ClientError::Interrupted);
                    }
                    return Err(ClientError::Transport(err));
                }
                None => return Ok(buf.freeze()),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
