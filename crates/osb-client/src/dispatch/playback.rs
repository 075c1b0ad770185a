//! Playback control services.

use async_trait::async_trait;

use osb_proto::fields::{parse_bool, parse_float, parse_u32};

use super::{text, ServiceCall, ServiceError, ServiceHandler, ServiceRegistry, ServiceReply};

pub(super) fn register(registry: &mut ServiceRegistry) {
    registry.register("load", Load);
    registry.register("cancelLoad", CancelLoad);
    registry.register("play", Play);
    registry.register("pause", Pause);
    registry.register("seek", Seek);
    registry.register("setRate", SetRate);
    registry.register("setVolume", SetVolume);
    registry.register("setRect", SetRect);
    registry.register("setVisible", SetVisible);
}

struct Load;

#[async_trait]
impl ServiceHandler for Load {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .load(&call.req.session_id, &call.req.instance_id, text(&call.req.url))
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct CancelLoad;

#[async_trait]
impl ServiceHandler for CancelLoad {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .cancel_load(&call.req.session_id, &call.req.instance_id)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct Play;

#[async_trait]
impl ServiceHandler for Play {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .play(&call.req.session_id, &call.req.instance_id)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct Pause;

#[async_trait]
impl ServiceHandler for Pause {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .pause(&call.req.session_id, &call.req.instance_id)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct Seek;

#[async_trait]
impl ServiceHandler for Seek {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let time = parse_float(text(&call.req.time))?;
        if let Some(listener) = call.listener {
            listener
                .seek(&call.req.session_id, &call.req.instance_id, time)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct SetRate;

#[async_trait]
impl ServiceHandler for SetRate {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let rate = parse_float(text(&call.req.rate))?;
        if let Some(listener) = call.listener {
            listener
                .set_rate(&call.req.session_id, &call.req.instance_id, rate)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct SetVolume;

#[async_trait]
impl ServiceHandler for SetVolume {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let volume = parse_float(text(&call.req.volume))?;
        if let Some(listener) = call.listener {
            listener
                .set_volume(&call.req.session_id, &call.req.instance_id, volume)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct SetRect;

#[async_trait]
impl ServiceHandler for SetRect {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let x = parse_u32(text(&call.req.x))?;
        let y = parse_u32(text(&call.req.y))?;
        let width = parse_u32(text(&call.req.width))?;
        let height = parse_u32(text(&call.req.height))?;
        if let Some(listener) = call.listener {
            listener
                .set_rect(&call.req.session_id, &call.req.instance_id, x, y, width, height)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct SetVisible;

#[async_trait]
impl ServiceHandler for SetVisible {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let visible = parse_bool(text(&call.req.visible));
        if let Some(listener) = call.listener {
            listener
                .set_visible(&call.req.session_id, &call.req.instance_id, visible)
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
