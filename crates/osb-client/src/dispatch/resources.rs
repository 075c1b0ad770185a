//! Resource fetch delegation services.
//!
//! `loadResource` lets the server route HTTP fetches (manifests, media
//! segments, license requests) through the client's own network stack; the
//! reply can carry the body inline as a payload or retain it client-side and
//! hand back a buffer id for later `appendBuffer`/`deleteResource` calls.

use async_trait::async_trait;

use osb_proto::fields::parse_uint;
use osb_proto::ByteRange;

use crate::listener::LoadResourceResult;

use super::{text, ServiceCall, ServiceError, ServiceHandler, ServiceRegistry, ServiceReply};

pub(super) fn register(registry: &mut ServiceRegistry) {
    registry.register("loadResource", LoadResource);
    registry.register("deleteResource", DeleteResource);
}

struct LoadResource;

#[async_trait]
impl ServiceHandler for LoadResource {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let byte_range = match &call.req.byte_range {
            Some(raw) if !raw.is_empty() => {
                let range = ByteRange::parse(raw)?;
                Some((range.start, range.end))
            }
            _ => None,
        };
        let sequence_number = match &call.req.sequence_number {
            Some(s) => parse_uint(s)?,
            None => 0,
        };

        let result = match call.listener {
            Some(listener) => {
                listener
                    .load_resource(
                        &call.req.session_id,
                        text(&call.req.url),
                        text(&call.req.method),
                        text(&call.req.headers),
                        text(&call.req.resource_id),
                        byte_range,
                        sequence_number,
                        call.payload,
                    )
                    .await?
            }
            None => LoadResourceResult {
                code: "404".to_owned(),
                ..Default::default()
            },
        };

        let mut reply = ServiceReply::empty()
            .field("code", result.code)
            .field("headers", result.headers)
            .field("bufferId", result.buffer_id)
            .field("bufferLength", result.buffer_length.to_string());
        if let Some(payload) = result.payload {
            reply = reply.with_payload(payload);
        }
        Ok(reply)
    }
}

struct DeleteResource;

#[async_trait]
impl ServiceHandler for DeleteResource {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .delete_resource(&call.req.session_id, text(&call.req.buffer_id))
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
