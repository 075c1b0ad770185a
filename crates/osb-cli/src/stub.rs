//! Stub listener used for testing and demonstration.
//!
//! Tracks just enough player state to answer the control channel
//! plausibly; a real client replaces this with its media player, MSE/EME
//! plumbing and renderer integration.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info};

use osb_client::{
    CdmSessionCreated, CdmSessionLoaded, KeySystemConfiguration, KeySystemSupport, ListenerError,
    LoadResourceResult, SessionListener, VideoFrame,
};
use osb_proto::{AppendMode, EmeSessionType, NetworkState, ReadyState, TimeRanges, UiImage};

type Result<T> = std::result::Result<T, ListenerError>;

const STUB_DURATION: f64 = 60.0;

#[derive(Default)]
struct PlayerState {
    loaded: bool,
    paused: bool,
}

/// In-memory player good enough to keep a session alive.
#[derive(Default)]
pub struct StubListener {
    state: Mutex<PlayerState>,
}

impl StubListener {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlayerState {
                loaded: false,
                paused: true,
            }),
        }
    }

    fn require_loaded(&self) -> Result<()> {
        if self.state.lock().loaded {
            Ok(())
        } else {
            Err("No video loaded".into())
        }
    }
}

#[async_trait]
impl SessionListener for StubListener {
    async fn load(&self, _session_id: &str, _instance_id: &str, url: &str) -> Result<()> {
        info!(url, "load");
        let mut state = self.state.lock();
        state.loaded = true;
        state.paused = true;
        Ok(())
    }

    async fn cancel_load(&self, _session_id: &str, _instance_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.loaded = false;
        state.paused = true;
        Ok(())
    }

    async fn play(&self, _session_id: &str, _instance_id: &str) -> Result<()> {
        self.require_loaded()?;
        self.state.lock().paused = false;
        Ok(())
    }

    async fn pause(&self, _session_id: &str, _instance_id: &str) -> Result<()> {
        self.require_loaded()?;
        self.state.lock().paused = true;
        Ok(())
    }

    async fn seek(&self, _session_id: &str, _instance_id: &str, time: f64) -> Result<()> {
        debug!(time, "seek");
        self.require_loaded()
    }

    async fn set_rate(&self, _session_id: &str, _instance_id: &str, _rate: f64) -> Result<()> {
        Ok(())
    }

    async fn set_volume(&self, _session_id: &str, _instance_id: &str, _volume: f64) -> Result<()> {
        Ok(())
    }

    async fn set_rect(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _x: u32,
        _y: u32,
        _width: u32,
        _height: u32,
    ) -> Result<()> {
        self.require_loaded()
    }

    async fn set_visible(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _visible: bool,
    ) -> Result<()> {
        self.require_loaded()
    }

    async fn get_paused(&self, _session_id: &str, _instance_id: &str) -> Result<bool> {
        self.require_loaded()?;
        Ok(self.state.lock().paused)
    }

    async fn get_seeking(&self, _session_id: &str, _instance_id: &str) -> Result<bool> {
        self.require_loaded()?;
        Ok(false)
    }

    async fn get_duration(&self, _session_id: &str, _instance_id: &str) -> Result<f64> {
        self.require_loaded()?;
        Ok(STUB_DURATION)
    }

    async fn get_current_time(&self, _session_id: &str, _instance_id: &str) -> Result<f64> {
        self.require_loaded()?;
        Ok(0.0)
    }

    async fn get_network_state(
        &self,
        _session_id: &str,
        _instance_id: &str,
    ) -> Result<NetworkState> {
        self.require_loaded()?;
        Ok(NetworkState::Loaded)
    }

    async fn get_ready_state(&self, _session_id: &str, _instance_id: &str) -> Result<ReadyState> {
        self.require_loaded()?;
        Ok(ReadyState::HaveEnoughData)
    }

    async fn get_seekable(&self, _session_id: &str, _instance_id: &str) -> Result<TimeRanges> {
        self.require_loaded()?;
        Ok(TimeRanges::single(STUB_DURATION))
    }

    async fn get_buffered(&self, _session_id: &str, _instance_id: &str) -> Result<TimeRanges> {
        self.require_loaded()?;
        Ok(TimeRanges::single(STUB_DURATION))
    }

    async fn get_max_time_seekable(&self, _session_id: &str, _instance_id: &str) -> Result<f64> {
        self.require_loaded()?;
        Ok(0.0)
    }

    async fn add_source_buffer(
        &self,
        _session_id: &str,
        _instance_id: &str,
        source_id: &str,
        mime_type: &str,
    ) -> Result<()> {
        debug!(source_id, mime_type, "addSourceBuffer");
        Ok(())
    }

    async fn remove_source_buffer(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _source_id: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn abort_source_buffer(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _source_id: &str,
    ) -> Result<()> {
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_buffer(
        &self,
        _session_id: &str,
        _instance_id: &str,
        source_id: &str,
        _append_window_start: f64,
        _append_window_end: f64,
        _buffer_id: &str,
        _buffer_offset: u64,
        _buffer_length: u64,
        payload: &[u8],
    ) -> Result<TimeRanges> {
        debug!(source_id, bytes = payload.len(), "appendBuffer");
        Ok(TimeRanges::default())
    }

    async fn set_append_mode(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _source_id: &str,
        _mode: AppendMode,
    ) -> Result<()> {
        Ok(())
    }

    async fn set_append_timestamp_offset(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _source_id: &str,
        _timestamp_offset: f64,
    ) -> Result<()> {
        Ok(())
    }

    async fn remove_buffer_range(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _source_id: &str,
        _start: f64,
        _end: f64,
    ) -> Result<()> {
        Ok(())
    }

    async fn change_source_buffer_type(
        &self,
        _session_id: &str,
        _instance_id: &str,
        _source_id: &str,
        _mime_type: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn request_key_system(
        &self,
        _session_id: &str,
        key_system: &str,
        configurations: &[KeySystemConfiguration],
    ) -> Result<KeySystemSupport> {
        debug!(key_system, count = configurations.len(), "requestKeySystem");
        // Claim support for the first offered configuration.
        Ok(KeySystemSupport {
            selected_configuration: configurations
                .first()
                .map(|c| json!({"label": c.label, "initDataTypes": c.init_data_types})),
        })
    }

    async fn cdm_create(
        &self,
        _session_id: &str,
        _key_system: &str,
        _security_origin: &str,
        _allow_distinctive_identifier: bool,
        _allow_persistent_state: bool,
    ) -> Result<String> {
        Ok("stub-cdm".to_owned())
    }

    async fn cdm_set_server_certificate(
        &self,
        _session_id: &str,
        _cdm_id: &str,
        _payload: &[u8],
    ) -> Result<()> {
        Ok(())
    }

    async fn cdm_session_create(
        &self,
        _session_id: &str,
        _event_instance_id: &str,
        _cdm_id: &str,
        _session_type: EmeSessionType,
        _init_data_type: &str,
        _payload: &[u8],
    ) -> Result<CdmSessionCreated> {
        Ok(CdmSessionCreated {
            cdm_session_id: "stub-cdm-session".to_owned(),
            expiration: 0.0,
        })
    }

    async fn cdm_session_update(
        &self,
        _session_id: &str,
        _event_instance_id: &str,
        _cdm_id: &str,
        _cdm_session_id: &str,
        _payload: &[u8],
    ) -> Result<()> {
        Ok(())
    }

    async fn cdm_session_load(
        &self,
        _session_id: &str,
        _event_instance_id: &str,
        _cdm_id: &str,
        _cdm_session_id: &str,
    ) -> Result<CdmSessionLoaded> {
        Ok(CdmSessionLoaded {
            loaded: false,
            expiration: 0.0,
        })
    }

    async fn cdm_session_remove(
        &self,
        _session_id: &str,
        _event_instance_id: &str,
        _cdm_id: &str,
        _cdm_session_id: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn cdm_session_close(
        &self,
        _session_id: &str,
        _event_instance_id: &str,
        _cdm_id: &str,
        _cdm_session_id: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn set_cdm(&self, _session_id: &str, _instance_id: &str, _cdm_id: &str) -> Result<()> {
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn load_resource(
        &self,
        _session_id: &str,
        url: &str,
        _method: &str,
        _headers: &str,
        _resource_id: &str,
        _byte_range: Option<(u64, Option<u64>)>,
        _sequence_number: u64,
        _payload: &[u8],
    ) -> Result<LoadResourceResult> {
        debug!(url, "loadResource (stub answers 404)");
        Ok(LoadResourceResult {
            code: "404".to_owned(),
            ..Default::default()
        })
    }

    async fn delete_resource(&self, _session_id: &str, _buffer_id: &str) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, _session_id: &str, message: &str) -> Result<String> {
        debug!(message, "sendMessage");
        Ok(String::new())
    }

    async fn on_page_load(&self, session_id: &str) -> Result<()> {
        info!(session_id, "page loaded");
        Ok(())
    }

    async fn on_address_bar_changed(&self, _session_id: &str, url: &str) -> Result<()> {
        info!(url, "address bar changed");
        Ok(())
    }

    async fn on_title_changed(&self, _session_id: &str, title: &str) -> Result<()> {
        info!(title, "title changed");
        Ok(())
    }

    async fn on_page_close(&self, session_id: &str) -> Result<()> {
        info!(session_id, "page closed");
        Ok(())
    }

    async fn on_ui_video_frame(&self, _session_id: &str, frame: VideoFrame) -> Result<()> {
        debug!(
            idx = frame.idx,
            key = frame.is_key_frame,
            config = frame.is_codec_config,
            bytes = frame.data.len(),
            "video frame"
        );
        Ok(())
    }

    async fn on_ui_image_frame(&self, _session_id: &str, image: UiImage) -> Result<()> {
        debug!(
            x = image.header.x,
            y = image.header.y,
            full_frame = image.header.is_frame == 1,
            bytes = image.img.len(),
            alpha_bytes = image.alpha_img.len(),
            "image tile"
        );
        Ok(())
    }
}
