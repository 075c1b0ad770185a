//! Player state query services.
//!
//! Without a listener these answer the defaults the server expects from an
//! idle player: loaded network state, enough-data ready state, zeroed
//! numerics and empty ranges.

use async_trait::async_trait;

use osb_proto::fields::{format_bool, format_float, format_float_list};
use osb_proto::{NetworkState, ReadyState, TimeRanges};

use super::{ServiceCall, ServiceError, ServiceHandler, ServiceRegistry, ServiceReply};

pub(super) fn register(registry: &mut ServiceRegistry) {
    registry.register("getPaused", GetPaused);
    registry.register("getSeeking", GetSeeking);
    registry.register("getDuration", GetDuration);
    registry.register("getCurrentTime", GetCurrentTime);
    registry.register("getNetworkState", GetNetworkState);
    registry.register("getReadyState", GetReadyState);
    registry.register("getSeekable", GetSeekable);
    registry.register("getBuffered", GetBuffered);
    registry.register("getMaxTimeSeekable", GetMaxTimeSeekable);
}

/// Encode parallel range arrays onto a reply as the comma-joined
/// `start`/`end` string lists the wire uses.
pub(super) fn range_reply(ranges: &TimeRanges) -> ServiceReply {
    ServiceReply::empty()
        .field("start", format_float_list(&ranges.start))
        .field("end", format_float_list(&ranges.end))
}

struct GetPaused;

#[async_trait]
impl ServiceHandler for GetPaused {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let paused = match call.listener {
            Some(listener) => {
                listener
                    .get_paused(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => false,
        };
        Ok(ServiceReply::empty().field("paused", format_bool(paused)))
    }
}

struct GetSeeking;

#[async_trait]
impl ServiceHandler for GetSeeking {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let seeking = match call.listener {
            Some(listener) => {
                listener
                    .get_seeking(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => false,
        };
        Ok(ServiceReply::empty().field("seeking", format_bool(seeking)))
    }
}

struct GetDuration;

#[async_trait]
impl ServiceHandler for GetDuration {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let duration = match call.listener {
            Some(listener) => {
                listener
                    .get_duration(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => 0.0,
        };
        Ok(ServiceReply::empty().field("duration", format_float(duration)))
    }
}

struct GetCurrentTime;

#[async_trait]
impl ServiceHandler for GetCurrentTime {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let time = match call.listener {
            Some(listener) => {
                listener
                    .get_current_time(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => 0.0,
        };
        Ok(ServiceReply::empty().field("currentTime", format_float(time)))
    }
}

struct GetNetworkState;

#[async_trait]
impl ServiceHandler for GetNetworkState {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let state = match call.listener {
            Some(listener) => {
                listener
                    .get_network_state(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => NetworkState::Loaded,
        };
        Ok(ServiceReply::empty().field("networkState", state.wire_value().to_string()))
    }
}

struct GetReadyState;

#[async_trait]
impl ServiceHandler for GetReadyState {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let state = match call.listener {
            Some(listener) => {
                listener
                    .get_ready_state(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => ReadyState::HaveEnoughData,
        };
        Ok(ServiceReply::empty().field("readyState", state.wire_value().to_string()))
    }
}

struct GetSeekable;

#[async_trait]
impl ServiceHandler for GetSeekable {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let ranges = match call.listener {
            Some(listener) => {
                listener
                    .get_seekable(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => TimeRanges::default(),
        };
        Ok(range_reply(&ranges))
    }
}

struct GetBuffered;

#[async_trait]
impl ServiceHandler for GetBuffered {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let ranges = match call.listener {
            Some(listener) => {
                listener
                    .get_buffered(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => TimeRanges::default(),
        };
        Ok(range_reply(&ranges))
    }
}

struct GetMaxTimeSeekable;

#[async_trait]
impl ServiceHandler for GetMaxTimeSeekable {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let time = match call.listener {
            Some(listener) => {
                listener
                    .get_max_time_seekable(&call.req.session_id, &call.req.instance_id)
                    .await?
            }
            None => 0.0,
        };
        Ok(ServiceReply::empty().field("maxTimeSeekable", format_float(time)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
