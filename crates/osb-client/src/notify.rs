//! Out-of-band client-to-server notifications.
//!
//! Unlike control-channel responses, which piggyback on the next poll,
//! notifications are pushed by the client whenever local player state
//! changes. They use the same framed format, POSTed to the control-response
//! endpoint with a `service=eventNotification` header and a process-wide
//! monotonic request id.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use osb_proto::fields::{format_bool, format_float};
use osb_proto::{encode_frame, NetworkState, ReadyState, SERVICE_EVENT_NOTIFICATION};

use crate::errors::ClientError;
use crate::session::SessionContext;

static NOTIFICATION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Player state snapshot for a `videostatechange` notification.
#[derive(Clone, Copy, Debug)]
pub struct VideoState {
    pub ready_state: ReadyState,
    pub network_state: NetworkState,
    pub paused: bool,
    pub seeking: bool,
    pub duration: f64,
    pub time: f64,
    pub video_width: u32,
    pub video_height: u32,
}

impl VideoState {
    fn to_json(self) -> Vec<u8> {
        let mut body = Map::new();
        body.insert("type".to_owned(), Value::from("videostatechange"));
        body.insert(
            "readyState".to_owned(),
            Value::from(self.ready_state.wire_value().to_string()),
        );
        body.insert(
            "networkState".to_owned(),
            Value::from(self.network_state.wire_value().to_string()),
        );
        body.insert("paused".to_owned(), Value::from(format_bool(self.paused)));
        body.insert("seeking".to_owned(), Value::from(format_bool(self.seeking)));
        body.insert("duration".to_owned(), Value::from(format_float(self.duration)));
        body.insert("currentTime".to_owned(), Value::from(format_float(self.time)));
        body.insert(
            "videoWidth".to_owned(),
            Value::from(self.video_width.to_string()),
        );
        body.insert(
            "videoHeight".to_owned(),
            Value::from(self.video_height.to_string()),
        );
        serde_json::to_vec(&Value::Object(body)).unwrap_or_default()
    }
}

impl SessionContext {
    /// Send a raw notification payload for a player instance.
    pub async fn send_notification(
        &self,
        instance_id: &str,
        payload: Bytes,
    ) -> Result<(), ClientError> {
        let request_id = NOTIFICATION_SEQ.fetch_add(1, Ordering::Relaxed);

        let mut header = Map::new();
        header.insert(
            "service".to_owned(),
            Value::from(SERVICE_EVENT_NOTIFICATION),
        );
        header.insert("sessionId".to_owned(), Value::from(self.session_id()));
        header.insert("instanceId".to_owned(), Value::from(instance_id));
        header.insert("requestId".to_owned(), Value::from(request_id.to_string()));

        let body = encode_frame(header, Some(&payload));
        let url = self.api_url("osb/session/control/response")?;
        debug!(session_id = self.session_id(), request_id, "sending notification");
        let _resp = self.http.post(url, body, &CancellationToken::new()).await?;
        Ok(())
    }

    /// Notify the server that local video element state changed.
    pub async fn send_video_state_change(
        &self,
        instance_id: &str,
        state: VideoState,
    ) -> Result<(), ClientError> {
        self.send_notification(instance_id, Bytes::from(state.to_json()))
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
