//! Media Source Extensions services.

use async_trait::async_trait;

use osb_proto::fields::{parse_float, parse_float_inf, parse_uint};
use osb_proto::{AppendMode, TimeRanges};

use super::queries::range_reply;
use super::{text, ServiceCall, ServiceError, ServiceHandler, ServiceRegistry, ServiceReply};

pub(super) fn register(registry: &mut ServiceRegistry) {
    registry.register("addSourceBuffer", AddSourceBuffer);
    registry.register("removeSourceBuffer", RemoveSourceBuffer);
    registry.register("abortSourceBuffer", AbortSourceBuffer);
    registry.register("appendBuffer", AppendBuffer);
    registry.register("setAppendMode", SetAppendMode);
    registry.register("setAppendTimestampOffset", SetAppendTimestampOffset);
    registry.register("removeBufferRange", RemoveBufferRange);
    registry.register("changeSourceBufferType", ChangeSourceBufferType);
}

struct AddSourceBuffer;

#[async_trait]
impl ServiceHandler for AddSourceBuffer {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .add_source_buffer(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.source_id),
                    text(&call.req.mime_type),
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct RemoveSourceBuffer;

#[async_trait]
impl ServiceHandler for RemoveSourceBuffer {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .remove_source_buffer(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.source_id),
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct AbortSourceBuffer;

#[async_trait]
impl ServiceHandler for AbortSourceBuffer {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .abort_source_buffer(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.source_id),
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct AppendBuffer;

#[async_trait]
impl ServiceHandler for AppendBuffer {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        // Append windows default to the full timeline when absent.
        let window_start = match &call.req.append_window_start {
            Some(s) => parse_float_inf(s)?,
            None => 0.0,
        };
        let window_end = match &call.req.append_window_end {
            Some(s) => parse_float_inf(s)?,
            None => f64::INFINITY,
        };
        // Buffer reference fields are zero when the media data rides inline.
        let buffer_offset = match &call.req.buffer_offset {
            Some(s) => parse_uint(s)?,
            None => 0,
        };
        let buffer_length = match &call.req.buffer_length {
            Some(s) => parse_uint(s)?,
            None => 0,
        };

        let ranges = match call.listener {
            Some(listener) => {
                listener
                    .append_buffer(
                        &call.req.session_id,
                        &call.req.instance_id,
                        text(&call.req.source_id),
                        window_start,
                        window_end,
                        text(&call.req.buffer_id),
                        buffer_offset,
                        buffer_length,
                        call.payload,
                    )
                    .await?
            }
            None => TimeRanges::default(),
        };
        Ok(range_reply(&ranges))
    }
}

struct SetAppendMode;

#[async_trait]
impl ServiceHandler for SetAppendMode {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let raw = text(&call.req.mode);
        let mode = parse_uint(raw)
            .ok()
            .and_then(AppendMode::from_wire)
            .ok_or_else(|| ServiceError::InvalidAppendMode(raw.to_owned()))?;
        if let Some(listener) = call.listener {
            listener
                .set_append_mode(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.source_id),
                    mode,
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct SetAppendTimestampOffset;

#[async_trait]
impl ServiceHandler for SetAppendTimestampOffset {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let offset = parse_float(text(&call.req.timestamp_offset))?;
        if let Some(listener) = call.listener {
            listener
                .set_append_timestamp_offset(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.source_id),
                    offset,
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct RemoveBufferRange;

#[async_trait]
impl ServiceHandler for RemoveBufferRange {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let start = parse_float(text(&call.req.start))?;
        let end = parse_float(text(&call.req.end))?;
        if let Some(listener) = call.listener {
            listener
                .remove_buffer_range(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.source_id),
                    start,
                    end,
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct ChangeSourceBufferType;

#[async_trait]
impl ServiceHandler for ChangeSourceBufferType {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .change_source_buffer_type(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.source_id),
                    text(&call.req.mime_type),
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
