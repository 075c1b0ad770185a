//! Browser page event services.

use async_trait::async_trait;

use super::{text, ServiceCall, ServiceError, ServiceHandler, ServiceRegistry, ServiceReply};

pub(super) fn register(registry: &mut ServiceRegistry) {
    registry.register("sendMessage", SendMessage);
    registry.register("onPageLoad", OnPageLoad);
    registry.register("onAddressBarChanged", OnAddressBarChanged);
    registry.register("onTitleChanged", OnTitleChanged);
    registry.register("onPageClose", OnPageClose);
}

struct SendMessage;

#[async_trait]
impl ServiceHandler for SendMessage {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        let reply = match call.listener {
            Some(listener) => {
                listener
                    .send_message(&call.req.session_id, text(&call.req.message))
                    .await?
            }
            None => String::new(),
        };
        // The reply text rides in the response's message field.
        Ok(ServiceReply::empty().field("message", reply))
    }
}

struct OnPageLoad;

#[async_trait]
impl ServiceHandler for OnPageLoad {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener.on_page_load(&call.req.session_id).await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct OnAddressBarChanged;

#[async_trait]
impl ServiceHandler for OnAddressBarChanged {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .on_address_bar_changed(&call.req.session_id, text(&call.req.url))
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct OnTitleChanged;

#[async_trait]
impl ServiceHandler for OnTitleChanged {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener
                .on_title_changed(&call.req.session_id, text(&call.req.title))
                .await?;
        }
        Ok(ServiceReply::empty())
    }
}

struct OnPageClose;

#[async_trait]
impl ServiceHandler for OnPageClose {
    async fn handle(&self, call: &ServiceCall<'_>) -> Result<ServiceReply, ServiceError> {
        if let Some(listener) = call.listener {
            listener.on_page_close(&call.req.session_id).await?;
        }
        Ok(ServiceReply::empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
