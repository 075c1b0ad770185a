//! Encrypted Media Extensions services.

use async_trait::async_trait;

use osb_proto::fields::{format_bool, format_float, parse_bool};
use osb_proto::EmeSessionType;

use crate::listener::KeySystemConfiguration;

use super::{text, ServiceCall, ServiceError, ServiceHandler, ServiceRegistry, ServiceReply};

pub(super) fn register(registry: &mut ServiceRegistry) {
    registry.register("requestKeySystem", RequestKeySystem);
    registry.register("cdmCreate", CdmCreate);
    registry.register("cdmSetServerCertificate", CdmSetServerCertificate);
    registry.register("cdmSessionCreate", CdmSessionCreate);
    registry.register("cdmSessionUpdate", CdmSessionUpdate);
    registry.register("cdmSessionLoad", CdmSessionLoad);
    registry.register("cdmSessionRemove", CdmSessionRemove);
    registry.register("cdmSessionClose", CdmSessionClose);
    registry.register("setCdm", SetCdm);
}

/// The `eventInstanceId` routes CDM events back to the right server-side
/// MediaKeySession; it defaults to the player instance when absent.
fn event_instance<'a>(call: &'a ServiceCall<'_>) -> &'a str {
    match &call.req.event_instance_id {
        Some(id) => id,
        None => &call.req.instance_id,
    }
}

struct RequestKeySystem;

#[async_trait]
impl ServiceHandler for RequestKeySystem {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let configurations: Vec<KeySystemConfiguration> = match &call.req.supported_configurations {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|err| ServiceError::Listener(format!(
                    "Failed to parse supportedConfigurations: {err}"
                )))?,
            None => Vec::new(),
        };

        let support = match call.listener {
            Some(listener) => {
                listener
                    .request_key_system(
                        &call.req.session_id,
                        text(&call.req.key_system),
                        &configurations,
                    )
                    .await?
            }
            None => Default::default(),
        };

        let mut reply = ServiceReply::empty();
        if let Some(config) = support.selected_configuration {
            reply = reply.json_field("supportedConfiguration", config);
        }
        Ok(reply)
    }
}

struct CdmCreate;

#[async_trait]
impl ServiceHandler for CdmCreate {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let cdm_id = match call.listener {
            Some(listener) => {
                listener
                    .cdm_create(
                        &call.req.session_id,
                        text(&call.req.key_system),
                        text(&call.req.security_origin),
                        parse_bool(text(&call.req.allow_distinctive_identifier)),
                        parse_bool(text(&call.req.allow_persistent_state)),
                    )
                    .await?
            }
            None => String::new(),
        };
        Ok(ServiceReply::empty().field("cdmId", cdm_id))
    }
}

struct CdmSetServerCertificate;

#[async_trait]
impl ServiceHandler for CdmSetServerCertificate {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .cdm_set_server_certificate(
                    &call.req.session_id,
                    text(&call.req.cdm_id),
                    call.payload,
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct CdmSessionCreate;

#[async_trait]
impl ServiceHandler for CdmSessionCreate {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let raw = text(&call.req.session_type);
        let session_type = if raw.is_empty() {
            EmeSessionType::Temporary
        } else {
            EmeSessionType::from_wire(raw)
                .ok_or_else(|| ServiceError::InvalidSessionType(raw.to_owned()))?
        };

        let created = match call.listener {
            Some(listener) => {
                listener
                    .cdm_session_create(
                        &call.req.session_id,
                        event_instance(call),
                        text(&call.req.cdm_id),
                        session_type,
                        text(&call.req.init_data_type),
                        call.payload,
                    )
                    .await?
            }
            None => Default::default(),
        };
        Ok(ServiceReply::empty()
            .field("cdmSessionId", created.cdm_session_id)
            .field("expiration", format_float(created.expiration)))
    }
}

struct CdmSessionUpdate;

#[async_trait]
impl ServiceHandler for CdmSessionUpdate {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .cdm_session_update(
                    &call.req.session_id,
                    event_instance(call),
                    text(&call.req.cdm_id),
                    text(&call.req.cdm_session_id),
                    call.payload,
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct CdmSessionLoad;

#[async_trait]
impl ServiceHandler for CdmSessionLoad {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let loaded = match call.listener {
            Some(listener) => {
                listener
                    .cdm_session_load(
                        &call.req.session_id,
                        event_instance(call),
                        text(&call.req.cdm_id),
                        text(&call.req.cdm_session_id),
                    )
                    .await?
            }
            None => Default::default(),
        };
        Ok(ServiceReply::empty()
            .field("loaded", format_bool(loaded.loaded))
            .field("expiration", format_float(loaded.expiration)))
    }
}

struct CdmSessionRemove;

#[async_trait]
impl ServiceHandler for CdmSessionRemove {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .cdm_session_remove(
                    &call.req.session_id,
                    event_instance(call),
                    text(&call.req.cdm_id),
                    text(&call.req.cdm_session_id),
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct CdmSessionClose;

#[async_trait]
impl ServiceHandler for CdmSessionClose {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .cdm_session_close(
                    &call.req.session_id,
                    event_instance(call),
                    text(&call.req.cdm_id),
                    text(&call.req.cdm_session_id),
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct SetCdm;

#[async_trait]
impl ServiceHandler for SetCdm {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .set_cdm(
                    &call.req.session_id,
                    &call.req.instance_id,
                    text(&call.req.cdm_id),
                )
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
