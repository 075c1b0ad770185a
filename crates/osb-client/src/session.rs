//! Session lifecycle: start/stop, the per-process registry, input
//! injection, and UI stream management.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

use crate::config::ClientConfig;
use crate::control::ControlChannel;
use crate::dispatch::ServiceRegistry;
use crate::errors::ClientError;
use crate::http::HttpClient;
use crate::listener::SessionListener;
use crate::ui::{self, UiFormat};

/// Hard ceiling on the requested UI dimensions.
const MAX_UI_WIDTH: u32 = 3840;
const MAX_UI_HEIGHT: u32 = 2160;

/// Arguments to [`SessionRegistry::start`].
pub struct SessionStartOptions {
    server_base: String,
    browser_url: String,
    session_id: Option<String>,
    pull_mode: bool,
    is_video_passthru: bool,
    browser_ui_output_url: Option<String>,
    video_stream_url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    listener: Option<Arc<dyn SessionListener>>,
}

impl SessionStartOptions {
    /// Start options for a server (`proto://host[:port]`) and the page the
    /// cloud browser should load.
    pub fn new(server_base: impl Into<String>, browser_url: impl Into<String>) -> Self {
        Self {
            server_base: server_base.into(),
            browser_url: browser_url.into(),
            session_id: None,
            pull_mode: false,
            is_video_passthru: false,
            browser_ui_output_url: None,
            video_stream_url: None,
            width: None,
            height: None,
            listener: None,
        }
    }

    /// Reuse a session id so the server rejoins the existing browser
    /// context instead of creating a fresh one.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Pull the UI stream over HTTP GET instead of having the server push
    /// it to `ui_output_url`.
    #[must_use]
    pub fn pull_mode(mut self, pull: bool) -> Self {
        self.pull_mode = pull;
        self
    }

    /// Media is decoded by the client; the server should not request a
    /// video stream of its own.
    #[must_use]
    pub fn video_passthru(mut self, passthru: bool) -> Self {
        self.is_video_passthru = passthru;
        self
    }

    /// Where the server should push the UI stream (ignored in pull mode).
    #[must_use]
    pub fn ui_output_url(mut self, url: impl Into<String>) -> Self {
        self.browser_ui_output_url = Some(url.into());
        self
    }

    /// URI of the stream the server renders video from.
    #[must_use]
    pub fn video_stream_url(mut self, url: impl Into<String>) -> Self {
        self.video_stream_url = Some(url.into());
        self
    }

    /// Requested UI dimensions, clamped to 3840x2160.
    #[must_use]
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width.min(MAX_UI_WIDTH));
        self.height = Some(height.min(MAX_UI_HEIGHT));
        self
    }

    /// The control-channel and UI-stream delegate. Without one the session
    /// runs in test mode: RPCs answer with defaults and the UI stream
    /// cannot be started.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

/// An input event for `/osb/session/event`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// Key press (down+up) with an optional character code.
    Key { code: u32, char_code: Option<u32> },
    KeyDown { code: u32, char_code: Option<u32> },
    KeyUp { code: u32, char_code: Option<u32> },
    Click { x: i32, y: i32 },
}

impl InputEvent {
    /// Build an event from the wire-level `type` token, rejecting anything
    /// outside `{key, keydown, keyup, click}`.
    pub fn from_wire(
        event_type: &str,
        code: u32,
        char_code: Option<u32>,
        x: i32,
        y: i32,
    ) -> Result<Self, ClientError> {
        match event_type.to_ascii_lowercase().as_str() {
            "key" => Ok(Self::Key { code, char_code }),
            "keydown" => Ok(Self::KeyDown { code, char_code }),
            "keyup" => Ok(Self::KeyUp { code, char_code }),
            "click" => Ok(Self::Click { x, y }),
            other => Err(ClientError::InvalidEventType(other.to_owned())),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Key { .. } => "key",
            Self::KeyDown { .. } => "keydown",
            Self::KeyUp { .. } => "keyup",
            Self::Click { .. } => "click",
        }
    }
}

/// `/osb/session/start` reply.
#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    #[serde(rename = "SessionID", default)]
    session_id: String,
}

/// One active session. Owned by the [`SessionRegistry`]; background tasks
/// hold the pieces they need rather than the context itself.
pub struct SessionContext {
    session_id: String,
    server_base: Url,
    pub(crate) http: HttpClient,
    listener: Option<Arc<dyn SessionListener>>,

    control_cancel: CancellationToken,
    control_task: Mutex<Option<JoinHandle<()>>>,

    ui_cancel: Mutex<Option<CancellationToken>>,
    ui_task: Mutex<Option<JoinHandle<()>>>,
    is_ui_streaming: Arc<AtomicBool>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("server_base", &self.server_base)
            .field("is_ui_streaming", &self.is_ui_streaming())
            .finish()
    }
}

impl SessionContext {
    /// The server-assigned session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether a UI stream is currently running.
    pub fn is_ui_streaming(&self) -> bool {
        self.is_ui_streaming.load(Ordering::SeqCst)
    }

    /// The cookies the session jar would attach to `url`, so callers that
    /// open the UI stream themselves keep load-balancer stickiness.
    pub fn url_cookies(&self, url: &Url) -> Vec<String> {
        self.http.cookies_for(url)
    }

    /// Build the UI stream URL for `format` without opening it.
    pub fn ui_url(
        &self,
        format: &str,
        ts_discon: bool,
        bitrate_kbps: Option<u32>,
    ) -> Result<Url, ClientError> {
        ui::ui_url(&self.server_base, &self.session_id, format, ts_discon, bitrate_kbps)
    }

    /// An endpoint URL with the session id applied.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = self.server_base.join(path)?;
        url.query_pairs_mut()
            .append_pair("session_id", &self.session_id);
        Ok(url)
    }

    /// Open the UI stream and deliver frames to the listener until stopped.
    ///
    /// Fails with "UI is already streaming" when a stream is active.
    pub async fn ui_stream_start(
        self: &Arc<Self>,
        format: &str,
        ts_discon: bool,
        bitrate_kbps: Option<u32>,
    ) -> Result<(), ClientError> {
        let parsed = UiFormat::parse(format)?;
        if !parsed.is_pullable() {
            return Err(ClientError::UnsupportedFormat {
                format: format.to_owned(),
            });
        }
        let Some(listener) = self.listener.clone() else {
            return Err(ClientError::NoListener);
        };
        let url = self.ui_url(format, ts_discon, bitrate_kbps)?;

        if self.is_ui_streaming.swap(true, Ordering::SeqCst) {
            return Err(ClientError::UiAlreadyStreaming);
        }

        let cancel = CancellationToken::new();
        *self.ui_cancel.lock() = Some(cancel.clone());

        let resp = match self.http.get_stream(url, &cancel).await {
            Ok(resp) => resp,
            Err(err) => {
                self.is_ui_streaming.store(false, Ordering::SeqCst);
                *self.ui_cancel.lock() = None;
                return Err(err);
            }
        };

        let session_id = self.session_id.clone();
        let streaming = Arc::clone(&self.is_ui_streaming);
        let handle = tokio::spawn(async move {
            let result = ui::run_ui_stream(resp, parsed, session_id.clone(), listener, cancel).await;
            streaming.store(false, Ordering::SeqCst);
            match result {
                Ok(()) => debug!(session_id, "UI stream ended"),
                Err(err) if err.is_interrupted() => {
                    debug!(session_id, "UI stream stopped");
                }
                Err(err) => error!(session_id, %err, "UI stream terminated"),
            }
        });
        *self.ui_task.lock() = Some(handle);
        Ok(())
    }

    /// Stop the UI stream and wait for the pipeline task to acknowledge.
    ///
    /// Fails with "UI is not streaming" when none is active.
    pub async fn ui_stream_stop(&self) -> Result<(), ClientError> {
        if !self.is_ui_streaming.load(Ordering::SeqCst) {
            return Err(ClientError::UiNotStreaming);
        }
        if let Some(cancel) = self.ui_cancel.lock().take() {
            cancel.cancel();
        }
        let handle = self.ui_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.is_ui_streaming.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Inject an input event into the session.
    pub async fn send_event(&self, event: InputEvent) -> Result<(), ClientError> {
        let mut url = self.api_url("osb/session/event")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("type", event.event_type());
            match event {
                InputEvent::Key { code, char_code }
                | InputEvent::KeyDown { code, char_code }
                | InputEvent::KeyUp { code, char_code } => {
                    query.append_pair("code", &code.to_string());
                    if let Some(char_code) = char_code {
                        query.append_pair("char", &char_code.to_string());
                    }
                }
                InputEvent::Click { x, y } => {
                    query.append_pair("x", &x.to_string());
                    query.append_pair("y", &y.to_string());
                }
            }
        }
        let _ = self.http.get(url, &CancellationToken::new()).await?;
        Ok(())
    }
}

/// Owner of every active session, keyed by session id.
pub struct SessionRegistry {
    config: ClientConfig,
    sessions: RwLock<HashMap<String, Arc<SessionContext>>>,
}

impl SessionRegistry {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start (or rejoin) a session and launch its control channel.
    pub async fn start(
        &self,
        options: SessionStartOptions,
    ) -> Result<Arc<SessionContext>, ClientError> {
        let server_base = Url::parse(&options.server_base)?;
        let http = HttpClient::new(&self.config)?;
        let control_cancel = CancellationToken::new();

        // The start request itself populates the cookie jar with the load
        // balancer's sticky cookie; every later request reuses the jar.
        let mut url = server_base.join("osb/session/start")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("browser_url", &options.browser_url);
            if !options.is_video_passthru {
                query.append_pair(
                    "video_stream_uri",
                    options.video_stream_url.as_deref().unwrap_or_default(),
                );
            }
            if options.pull_mode {
                query.append_pair("browser_ui_video_pull", "yes");
            } else {
                query.append_pair(
                    "browser_ui_output_url",
                    options.browser_ui_output_url.as_deref().unwrap_or_default(),
                );
            }
            if let Some(id) = &options.session_id {
                query.append_pair("session_id", id);
            }
            if let Some(width) = options.width {
                query.append_pair("width", &width.min(MAX_UI_WIDTH).to_string());
            }
            if let Some(height) = options.height {
                query.append_pair("height", &height.min(MAX_UI_HEIGHT).to_string());
            }
        }

        let body = http.get(url, &control_cancel).await?;
        let reply: StartSessionResponse =
            serde_json::from_slice(&body).map_err(|_| ClientError::StartResponse)?;
        if reply.session_id.is_empty() {
            return Err(ClientError::StartResponse);
        }

        info!(session_id = %reply.session_id, "session started");

        let ctx = Arc::new(SessionContext {
            session_id: reply.session_id.clone(),
            server_base,
            http,
            listener: options.listener,
            control_cancel: control_cancel.clone(),
            control_task: Mutex::new(None),
            ui_cancel: Mutex::new(None),
            ui_task: Mutex::new(None),
            is_ui_streaming: Arc::new(AtomicBool::new(false)),
        });

        let channel = ControlChannel {
            http: ctx.http.clone(),
            control_url: ctx.api_url("osb/session/control")?,
            session_id: ctx.session_id.clone(),
            listener: ctx.listener.clone(),
            registry: ServiceRegistry::with_builtin(),
            cancel: control_cancel,
        };
        let session_id = ctx.session_id.clone();
        let handle = tokio::spawn(async move {
            match channel.run().await {
                Err(err) if err.is_interrupted() => {
                    debug!(session_id, "control channel stopped");
                }
                Err(err) => error!(session_id, %err, "control channel terminated"),
                Ok(()) => {}
            }
        });
        *ctx.control_task.lock() = Some(handle);

        self.sessions
            .write()
            .insert(ctx.session_id.clone(), Arc::clone(&ctx));
        Ok(ctx)
    }

    /// Look up an active session by id.
    pub fn get(&self, session_id: &str) -> Result<Arc<SessionContext>, ClientError> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ClientError::SessionNotFound(session_id.to_owned()))
    }

    /// Stop a session: end the UI stream, shut down the control channel,
    /// wait for both acknowledgments, then tell the server.
    ///
    /// After this returns no further listener callback occurs for the
    /// session.
    pub async fn stop(&self, ctx: &Arc<SessionContext>) -> Result<(), ClientError> {
        if ctx.is_ui_streaming() {
            match ctx.ui_stream_stop().await {
                Ok(()) | Err(ClientError::UiNotStreaming) => {}
                Err(err) => return Err(err),
            }
        }

        ctx.control_cancel.cancel();
        let handle = ctx.control_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        self.sessions.write().remove(&ctx.session_id);

        let url = ctx.api_url("osb/session/stop")?;
        let _ = ctx.http.get(url, &CancellationToken::new()).await?;
        info!(session_id = %ctx.session_id, "session stopped");
        Ok(())
    }

    /// Ids of all registered sessions.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
