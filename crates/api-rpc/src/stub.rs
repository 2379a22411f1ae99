//! Remote-request dispatch stub
//!
//! `code -> validate code -> decode payload -> validate enum arguments ->
//! invoke service -> reply`. Nothing here blocks on hardware: operations
//! that need it submit a task and return its id.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use dhfwk_core::domain::{DhTopic, LocalSysSpec};
use dhfwk_core::error::{code, Result};
use dhfwk_core::port::DistributedHardware;

use crate::listener::ListenerResolver;
use crate::types::{Reply, Request, RequestCode};

pub struct DistributedHardwareStub {
    service: Arc<dyn DistributedHardware>,
    listeners: Arc<dyn ListenerResolver>,
}

/// Membership check for raw topic ids
pub fn valid_topic(raw: u32) -> bool {
    DhTopic::is_valid(raw)
}

/// Membership check for raw local spec ids
pub fn valid_query_local_spec(raw: u32) -> bool {
    LocalSysSpec::is_valid(raw)
}

impl DistributedHardwareStub {
    pub fn new(service: Arc<dyn DistributedHardware>, listeners: Arc<dyn ListenerResolver>) -> Self {
        Self { service, listeners }
    }

    /// Handle one remote request
    pub fn on_remote_request(&self, raw_code: u32, data: &Value) -> Reply {
        let Some(request_code) = RequestCode::from_u32(raw_code) else {
            warn!(code = raw_code, "Unsupported request code");
            return Reply::status(code::UNSUPPORTED_OPERATION);
        };

        let request = match Request::decode(request_code, data) {
            Ok(request) => request,
            Err(e) => {
                warn!(request = ?request_code, error = %e, "Rejected remote request");
                return Reply::error(&e);
            }
        };

        debug!(request = ?request_code, "Dispatching remote request");
        match self.dispatch(request) {
            Ok(payload) => Reply::ok(payload),
            Err(e) => {
                warn!(request = ?request_code, error = %e, "Remote request failed");
                Reply::error(&e)
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Option<Value>> {
        match request {
            Request::RegisterPublisherListener { topic, listener_id } => {
                let listener = self.listeners.acquire(&listener_id, topic)?;
                if let Err(e) = self.service.register_publisher_listener(topic, listener) {
                    self.listeners.release(&listener_id, topic);
                    return Err(e);
                }
                Ok(None)
            }
            Request::UnregisterPublisherListener { topic, listener_id } => {
                let listener = self.listeners.lookup(&listener_id)?;
                self.service.unregister_publisher_listener(topic, listener)?;
                self.listeners.release(&listener_id, topic);
                Ok(None)
            }
            Request::PublishMessage { topic, message } => {
                self.service.publish_message(topic, &message)?;
                Ok(None)
            }
            Request::QueryLocalSysSpec { spec } => {
                let description = self.service.query_local_sys_spec(spec)?;
                Ok(Some(json!({ "spec": description })))
            }
            Request::Initialize { role } => {
                let engine_id = self.service.initialize(role)?;
                Ok(Some(json!({ "engine_id": engine_id })))
            }
            Request::Release { engine_id } => {
                self.service.release(engine_id)?;
                Ok(None)
            }
            Request::CreateControlChannel {
                engine_id,
                peer_dev_id,
            } => {
                self.service.create_control_channel(engine_id, &peer_dev_id)?;
                Ok(None)
            }
            Request::Notify { engine_id, event } => {
                let task_id = self.service.notify(engine_id, event)?;
                Ok(task_id.map(|id| json!({ "task_id": id })))
            }
            Request::RegisterControlCenterCallback {
                engine_id,
                callback_id,
            } => {
                self.service
                    .register_control_center_callback(engine_id, &callback_id)?;
                Ok(None)
            }
        }
    }
}
