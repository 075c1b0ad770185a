//! The listener interface an embedding application implements.
//!
//! The control channel delegates media playback, MSE, EME, resource loading
//! and browser events to this trait; the UI stream pipeline delivers frames
//! through it. Implementations must be re-entrant with respect to the
//! session APIs and may be called concurrently from the control-channel task
//! and the UI stream task of the same session.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use osb_proto::{
    AppendMode, EmeRequirement, EmeSessionType, NetworkState, ReadyState, TimeRanges, UiImage,
};

/// Error returned by a listener callback. The text is surfaced verbatim to
/// the server as the RPC's `message` with `result="ERROR"`, letting the
/// cloud browser react (e.g. fire a DOM error event).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl From<String> for ListenerError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ListenerError {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Convenience alias for listener results.
pub type ListenerResult<T> = Result<T, ListenerError>;

/// One EME `MediaKeySystemConfiguration` from `requestKeySystem`.
///
/// Capability entries keep their wire JSON shape; the listener forwards them
/// to its CDM which knows how to evaluate robustness strings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KeySystemConfiguration {
    pub label: String,
    pub init_data_types: Vec<String>,
    pub audio_capabilities: Vec<Value>,
    pub video_capabilities: Vec<Value>,
    pub distinctive_identifier: Option<EmeRequirement>,
    pub persistent_state: Option<EmeRequirement>,
    pub session_types: Vec<String>,
}

/// Reply to `requestKeySystem`: the configuration the client's CDM selected,
/// or `None` when the key system is unsupported.
#[derive(Clone, Debug, Default)]
pub struct KeySystemSupport {
    pub selected_configuration: Option<Value>,
}

/// Reply to `cdmSessionCreate`.
#[derive(Clone, Debug, Default)]
pub struct CdmSessionCreated {
    pub cdm_session_id: String,
    pub expiration: f64,
}

/// Reply to `cdmSessionLoad`.
#[derive(Clone, Debug, Default)]
pub struct CdmSessionLoaded {
    pub loaded: bool,
    pub expiration: f64,
}

/// Reply to `loadResource`.
#[derive(Clone, Debug, Default)]
pub struct LoadResourceResult {
    /// HTTP status code, as the decimal string the wire expects.
    pub code: String,
    /// Raw response headers block.
    pub headers: String,
    /// Server-side buffer handle when the body was retained client-side.
    pub buffer_id: String,
    /// Length of the retained buffer.
    pub buffer_length: u64,
    /// Response body bytes to send back inline, if any.
    pub payload: Option<Bytes>,
}

/// One video frame from the UI stream demuxer.
///
/// For H.264 the data is Annex-B: every NAL unit behind a 4-byte start
/// code, with SPS and PPS prepended before every key frame. Codec
/// configuration (SPS+PPS alone) is delivered once up front with
/// `is_codec_config` set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VideoFrame {
    pub is_codec_config: bool,
    pub is_key_frame: bool,
    pub idx: u64,
    pub pts: i64,
    pub dts: i64,
    pub data: Bytes,
}

/// The control-channel and UI-stream delegate.
///
/// Grouped the way the service catalog groups the RPCs. Every method may be
/// invoked with `session_id` identifying the session the RPC arrived on;
/// media operations additionally carry the player `instance_id`.
#[async_trait]
pub trait SessionListener: Send + Sync {
    // ─── Playback ────────────────────────────────────────────────────────

    async fn load(&self, session_id: &str, instance_id: &str, url: &str) -> ListenerResult<()>;
    async fn cancel_load(&self, session_id: &str, instance_id: &str) -> ListenerResult<()>;
    async fn play(&self, session_id: &str, instance_id: &str) -> ListenerResult<()>;
    async fn pause(&self, session_id: &str, instance_id: &str) -> ListenerResult<()>;
    async fn seek(&self, session_id: &str, instance_id: &str, time: f64) -> ListenerResult<()>;
    async fn set_rate(&self, session_id: &str, instance_id: &str, rate: f64) -> ListenerResult<()>;
    async fn set_volume(
        &self,
        session_id: &str,
        instance_id: &str,
        volume: f64,
    ) -> ListenerResult<()>;
    async fn set_rect(
        &self,
        session_id: &str,
        instance_id: &str,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> ListenerResult<()>;
    async fn set_visible(
        &self,
        session_id: &str,
        instance_id: &str,
        visible: bool,
    ) -> ListenerResult<()>;

    // ─── Queries ─────────────────────────────────────────────────────────

    async fn get_paused(&self, session_id: &str, instance_id: &str) -> ListenerResult<bool>;
    async fn get_seeking(&self, session_id: &str, instance_id: &str) -> ListenerResult<bool>;
    async fn get_duration(&self, session_id: &str, instance_id: &str) -> ListenerResult<f64>;
    async fn get_current_time(&self, session_id: &str, instance_id: &str) -> ListenerResult<f64>;
    async fn get_network_state(
        &self,
        session_id: &str,
        instance_id: &str,
    ) -> ListenerResult<NetworkState>;
    async fn get_ready_state(
        &self,
        session_id: &str,
        instance_id: &str,
    ) -> ListenerResult<ReadyState>;
    async fn get_seekable(
        &self,
        session_id: &str,
        instance_id: &str,
    ) -> ListenerResult<TimeRanges>;
    async fn get_buffered(
        &self,
        session_id: &str,
        instance_id: &str,
    ) -> ListenerResult<TimeRanges>;
    async fn get_max_time_seekable(
        &self,
        session_id: &str,
        instance_id: &str,
    ) -> ListenerResult<f64>;

    // ─── MSE ─────────────────────────────────────────────────────────────

    async fn add_source_buffer(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
        mime_type: &str,
    ) -> ListenerResult<()>;
    async fn remove_source_buffer(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
    ) -> ListenerResult<()>;
    async fn abort_source_buffer(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
    ) -> ListenerResult<()>;
    #[allow(clippy::too_many_arguments)]
    async fn append_buffer(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
        append_window_start: f64,
        append_window_end: f64,
        buffer_id: &str,
        buffer_offset: u64,
        buffer_length: u64,
        payload: &[u8],
    ) -> ListenerResult<TimeRanges>;
    async fn set_append_mode(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
        mode: AppendMode,
    ) -> ListenerResult<()>;
    async fn set_append_timestamp_offset(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
        timestamp_offset: f64,
    ) -> ListenerResult<()>;
    async fn remove_buffer_range(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
        start: f64,
        end: f64,
    ) -> ListenerResult<()>;
    async fn change_source_buffer_type(
        &self,
        session_id: &str,
        instance_id: &str,
        source_id: &str,
        mime_type: &str,
    ) -> ListenerResult<()>;

    // ─── EME ─────────────────────────────────────────────────────────────

    async fn request_key_system(
        &self,
        session_id: &str,
        key_system: &str,
        supported_configurations: &[KeySystemConfiguration],
    ) -> ListenerResult<KeySystemSupport>;
    async fn cdm_create(
        &self,
        session_id: &str,
        key_system: &str,
        security_origin: &str,
        allow_distinctive_identifier: bool,
        allow_persistent_state: bool,
    ) -> ListenerResult<String>;
    async fn cdm_set_server_certificate(
        &self,
        session_id: &str,
        cdm_id: &str,
        payload: &[u8],
    ) -> ListenerResult<()>;
    async fn cdm_session_create(
        &self,
        session_id: &str,
        event_instance_id: &str,
        cdm_id: &str,
        session_type: EmeSessionType,
        init_data_type: &str,
        payload: &[u8],
    ) -> ListenerResult<CdmSessionCreated>;
    async fn cdm_session_update(
        &self,
        session_id: &str,
        event_instance_id: &str,
        cdm_id: &str,
        cdm_session_id: &str,
        payload: &[u8],
    ) -> ListenerResult<()>;
    async fn cdm_session_load(
        &self,
        session_id: &str,
        event_instance_id: &str,
        cdm_id: &str,
        cdm_session_id: &str,
    ) -> ListenerResult<CdmSessionLoaded>;
    async fn cdm_session_remove(
        &self,
        session_id: &str,
        event_instance_id: &str,
        cdm_id: &str,
        cdm_session_id: &str,
    ) -> ListenerResult<()>;
    async fn cdm_session_close(
        &self,
        session_id: &str,
        event_instance_id: &str,
        cdm_id: &str,
        cdm_session_id: &str,
    ) -> ListenerResult<()>;
    async fn set_cdm(
        &self,
        session_id: &str,
        instance_id: &str,
        cdm_id: &str,
    ) -> ListenerResult<()>;

    // ─── Resources ───────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    async fn load_resource(
        &self,
        session_id: &str,
        url: &str,
        method: &str,
        headers: &str,
        resource_id: &str,
        byte_range: Option<(u64, Option<u64>)>,
        sequence_number: u64,
        payload: &[u8],
    ) -> ListenerResult<LoadResourceResult>;
    async fn delete_resource(&self, session_id: &str, buffer_id: &str) -> ListenerResult<()>;

    // ─── Browser ─────────────────────────────────────────────────────────

    async fn send_message(&self, session_id: &str, message: &str) -> ListenerResult<String>;
    async fn on_page_load(&self, session_id: &str) -> ListenerResult<()>;
    async fn on_address_bar_changed(&self, session_id: &str, url: &str) -> ListenerResult<()>;
    async fn on_title_changed(&self, session_id: &str, title: &str) -> ListenerResult<()>;
    async fn on_page_close(&self, session_id: &str) -> ListenerResult<()>;

    // ─── UI stream ───────────────────────────────────────────────────────

    async fn on_ui_video_frame(&self, session_id: &str, frame: VideoFrame) -> ListenerResult<()>;
    async fn on_ui_image_frame(&self, session_id: &str, image: UiImage) -> ListenerResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
