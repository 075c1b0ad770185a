//! Shared test double for the listener interface.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;

use osb_proto::{AppendMode, EmeSessionType, NetworkState, ReadyState, TimeRanges, UiImage};

use crate::listener::{
    CdmSessionCreated, CdmSessionLoaded, KeySystemConfiguration, KeySystemSupport, ListenerError,
    ListenerResult, LoadResourceResult, SessionListener, VideoFrame,
};

/// Records every callback and answers with canned values. When `fail_with`
/// is set, every control-channel callback errors with that text.
#[derive(Default)]
pub(crate) struct TestListener {
    pub calls: Mutex<Vec<String>>,
    pub fail_with: Option<String>,
    /// Fail UI frame callbacks too (they normally just record).
    pub fail_frames: bool,
    pub duration: f64,
    pub buffered: TimeRanges,
    pub certificates: Mutex<Vec<Vec<u8>>>,
    pub video_frames: Mutex<Vec<VideoFrame>>,
    pub image_frames: Mutex<Vec<UiImage>>,
}

impl TestListener {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_owned()),
            ..Default::default()
        }
    }

    fn record(&self, call: impl Into<String>) -> ListenerResult<()> {
        self.calls.lock().push(call.into());
        match &self.fail_with {
            Some(message) => Err(ListenerError(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionListener for TestListener {
    async fn load(&self, _: &str, _: &str, url: &str) -> ListenerResult<()> {
        self.record(format!("load {url}"))
    }

    async fn cancel_load(&self, _: &str, _: &str) -> ListenerResult<()> {
        self.record("cancelLoad")
    }

    async fn play(&self, _: &str, _: &str) -> ListenerResult<()> {
        self.record("play")
    }

    async fn pause(&self, _: &str, _: &str) -> ListenerResult<()> {
        self.record("pause")
    }

    async fn seek(&self, _: &str, _: &str, time: f64) -> ListenerResult<()> {
        self.record(format!("seek {time}"))
    }

    async fn set_rate(&self, _: &str, _: &str, rate: f64) -> ListenerResult<()> {
        self.record(format!("setRate {rate}"))
    }

    async fn set_volume(&self, _: &str, _: &str, volume: f64) -> ListenerResult<()> {
        self.record(format!("setVolume {volume}"))
    }

    async fn set_rect(
        &self,
        _: &str,
        _: &str,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> ListenerResult<()> {
        self.record(format!("setRect {x},{y},{width},{height}"))
    }

    async fn set_visible(&self, _: &str, _: &str, visible: bool) -> ListenerResult<()> {
        self.record(format!("setVisible {visible}"))
    }

    async fn get_paused(&self, _: &str, _: &str) -> ListenerResult<bool> {
        self.record("getPaused")?;
        Ok(true)
    }

    async fn get_seeking(&self, _: &str, _: &str) -> ListenerResult<bool> {
        self.record("getSeeking")?;
        Ok(false)
    }

    async fn get_duration(&self, _: &str, _: &str) -> ListenerResult<f64> {
        self.record("getDuration")?;
        Ok(self.duration)
    }

    async fn get_current_time(&self, _: &str, _: &str) -> ListenerResult<f64> {
        self.record("getCurrentTime")?;
        Ok(1.25)
    }

    async fn get_network_state(&self, _: &str, _: &str) -> ListenerResult<NetworkState> {
        self.record("getNetworkState")?;
        Ok(NetworkState::Loading)
    }

    async fn get_ready_state(&self, _: &str, _: &str) -> ListenerResult<ReadyState> {
        self.record("getReadyState")?;
        Ok(ReadyState::HaveMetadata)
    }

    async fn get_seekable(&self, _: &str, _: &str) -> ListenerResult<TimeRanges> {
        self.record("getSeekable")?;
        Ok(TimeRanges::single(self.duration))
    }

    async fn get_buffered(&self, _: &str, _: &str) -> ListenerResult<TimeRanges> {
        self.record("getBuffered")?;
        Ok(self.buffered.clone())
    }

    async fn get_max_time_seekable(&self, _: &str, _: &str) -> ListenerResult<f64> {
        self.record("getMaxTimeSeekable")?;
        Ok(self.duration)
    }

    async fn add_source_buffer(
        &self,
        _: &str,
        _: &str,
        source_id: &str,
        mime_type: &str,
    ) -> ListenerResult<()> {
        self.record(format!("addSourceBuffer {source_id} {mime_type}"))
    }

    async fn remove_source_buffer(&self, _: &str, _: &str, source_id: &str) -> ListenerResult<()> {
        self.record(format!("removeSourceBuffer {source_id}"))
    }

    async fn abort_source_buffer(&self, _: &str, _: &str, source_id: &str) -> ListenerResult<()> {
        self.record(format!("abortSourceBuffer {source_id}"))
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_buffer(
        &self,
        _: &str,
        _: &str,
        source_id: &str,
        _append_window_start: f64,
        _append_window_end: f64,
        _buffer_id: &str,
        _buffer_offset: u64,
        _buffer_length: u64,
        payload: &[u8],
    ) -> ListenerResult<TimeRanges> {
        self.record(format!("appendBuffer {source_id} {}", payload.len()))?;
        Ok(self.buffered.clone())
    }

    async fn set_append_mode(
        &self,
        _: &str,
        _: &str,
        source_id: &str,
        mode: AppendMode,
    ) -> ListenerResult<()> {
        self.record(format!("setAppendMode {source_id} {mode:?}"))
    }

    async fn set_append_timestamp_offset(
        &self,
        _: &str,
        _: &str,
        source_id: &str,
        offset: f64,
    ) -> ListenerResult<()> {
        self.record(format!("setAppendTimestampOffset {source_id} {offset}"))
    }

    async fn remove_buffer_range(
        &self,
        _: &str,
        _: &str,
        source_id: &str,
        start: f64,
        end: f64,
    ) -> ListenerResult<()> {
        self.record(format!("removeBufferRange {source_id} {start}-{end}"))
    }

    async fn change_source_buffer_type(
        &self,
        _: &str,
        _: &str,
        source_id: &str,
        mime_type: &str,
    ) -> ListenerResult<()> {
        self.record(format!("changeSourceBufferType {source_id} {mime_type}"))
    }

    async fn request_key_system(
        &self,
        _: &str,
        key_system: &str,
        configurations: &[KeySystemConfiguration],
    ) -> ListenerResult<KeySystemSupport> {
        self.record(format!("requestKeySystem {key_system} {}", configurations.len()))?;
        Ok(KeySystemSupport {
            selected_configuration: Some(json!({"initDataTypes": ["cenc"]})),
        })
    }

    async fn cdm_create(
        &self,
        _: &str,
        key_system: &str,
        _: &str,
        _: bool,
        _: bool,
    ) -> ListenerResult<String> {
        self.record(format!("cdmCreate {key_system}"))?;
        Ok("cdm-1".to_owned())
    }

    async fn cdm_set_server_certificate(
        &self,
        _: &str,
        cdm_id: &str,
        payload: &[u8],
    ) -> ListenerResult<()> {
        self.certificates.lock().push(payload.to_vec());
        self.record(format!("cdmSetServerCertificate {cdm_id}"))
    }

    async fn cdm_session_create(
        &self,
        _: &str,
        _: &str,
        _: &str,
        session_type: EmeSessionType,
        _: &str,
        _: &[u8],
    ) -> ListenerResult<CdmSessionCreated> {
        self.record(format!("cdmSessionCreate {session_type:?}"))?;
        Ok(CdmSessionCreated {
            cdm_session_id: "cdmsess-1".to_owned(),
            expiration: 0.0,
        })
    }

    async fn cdm_session_update(
        &self,
        _: &str,
        _: &str,
        _: &str,
        cdm_session_id: &str,
        _: &[u8],
    ) -> ListenerResult<()> {
        self.record(format!("cdmSessionUpdate {cdm_session_id}"))
    }

    async fn cdm_session_load(
        &self,
        _: &str,
        _: &str,
        _: &str,
        cdm_session_id: &str,
    ) -> ListenerResult<CdmSessionLoaded> {
        self.record(format!("cdmSessionLoad {cdm_session_id}"))?;
        Ok(CdmSessionLoaded {
            loaded: true,
            expiration: 9.5,
        })
    }

    async fn cdm_session_remove(
        &self,
        _: &str,
        _: &str,
        _: &str,
        cdm_session_id: &str,
    ) -> ListenerResult<()> {
        self.record(format!("cdmSessionRemove {cdm_session_id}"))
    }

    async fn cdm_session_close(
        &self,
        _: &str,
        _: &str,
        _: &str,
        cdm_session_id: &str,
    ) -> ListenerResult<()> {
        self.record(format!("cdmSessionClose {cdm_session_id}"))
    }

    async fn set_cdm(&self, _: &str, _: &str, cdm_id: &str) -> ListenerResult<()> {
        self.record(format!("setCdm {cdm_id}"))
    }

    #[allow(clippy::too_many_arguments)]
    async fn load_resource(
        &self,
        _: &str,
        url: &str,
        _: &str,
        _: &str,
        _: &str,
        _: Option<(u64, Option<u64>)>,
        _: u64,
        _: &[u8],
    ) -> ListenerResult<LoadResourceResult> {
        self.record(format!("loadResource {url}"))?;
        Ok(LoadResourceResult {
            code: "200".to_owned(),
            headers: "Content-Type: video/mp4".to_owned(),
            buffer_id: String::new(),
            buffer_length: 4,
            payload: Some(Bytes::from_static(b"\x10\x20\x30\x40")),
        })
    }

    async fn delete_resource(&self, _: &str, buffer_id: &str) -> ListenerResult<()> {
        self.record(format!("deleteResource {buffer_id}"))
    }

    async fn send_message(&self, _: &str, message: &str) -> ListenerResult<String> {
        self.record(format!("sendMessage {message}"))?;
        Ok(format!("echo:{message}"))
    }

    async fn on_page_load(&self, _: &str) -> ListenerResult<()> {
        self.record("onPageLoad")
    }

    async fn on_address_bar_changed(&self, _: &str, url: &str) -> ListenerResult<()> {
        self.record(format!("onAddressBarChanged {url}"))
    }

    async fn on_title_changed(&self, _: &str, title: &str) -> ListenerResult<()> {
        self.record(format!("onTitleChanged {title}"))
    }

    async fn on_page_close(&self, _: &str) -> ListenerResult<()> {
        self.record("onPageClose")
    }

    async fn on_ui_video_frame(&self, _: &str, frame: VideoFrame) -> ListenerResult<()> {
        self.video_frames.lock().push(frame);
        if self.fail_frames {
            return Err("renderer gone".into());
        }
        Ok(())
    }

    async fn on_ui_image_frame(&self, _: &str, image: UiImage) -> ListenerResult<()> {
        self.image_frames.lock().push(image);
        if self.fail_frames {
            return Err("renderer gone".into());
        }
        Ok(())
    }
}
