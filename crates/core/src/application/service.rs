// Distributed Hardware Service - the operations behind the dispatch stub
// plus the local policy triggers (device join/leave, explicit enable/disable)
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::control_center::{ControlCenter, EngineInfo};
use crate::application::executor::{TaskExecutor, TaskHandle};
use crate::application::publisher::Publisher;
use crate::domain::{
    anonymize, AvTransEvent, AvTransEventType, Capability, DhTopic, DhType, HardwareUnit,
    LocalSysSpec, TaskDump, TaskId, TaskType, TransRole,
};
use crate::error::{AppError, Result};
use crate::port::{DistributedHardware, PublisherListener};

/// Codec lists reported by `query_local_sys_spec`
#[derive(Debug, Clone)]
pub struct SysSpecTable {
    entries: HashMap<LocalSysSpec, Vec<String>>,
}

impl Default for SysSpecTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            LocalSysSpec::HistreamerAudioEncoder,
            vec!["audio/mp4a-latm".to_string(), "audio/opus".to_string()],
        );
        entries.insert(
            LocalSysSpec::HistreamerAudioDecoder,
            vec!["audio/mp4a-latm".to_string(), "audio/opus".to_string()],
        );
        entries.insert(
            LocalSysSpec::HistreamerVideoEncoder,
            vec!["video/avc".to_string(), "video/hevc".to_string()],
        );
        entries.insert(
            LocalSysSpec::HistreamerVideoDecoder,
            vec!["video/avc".to_string(), "video/hevc".to_string()],
        );
        Self { entries }
    }
}

impl SysSpecTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, spec: LocalSysSpec, codecs: Vec<String>) -> Self {
        self.entries.insert(spec, codecs);
        self
    }

    fn to_json(&self, spec: LocalSysSpec) -> Result<String> {
        #[derive(Serialize)]
        struct SpecReply<'a> {
            spec: LocalSysSpec,
            codecs: &'a [String],
        }

        let codecs = self
            .entries
            .get(&spec)
            .ok_or_else(|| AppError::NotFound(format!("no {} configured", spec)))?;
        Ok(serde_json::to_string(&SpecReply { spec, codecs })?)
    }
}

pub struct DistributedHardwareService {
    executor: TaskExecutor,
    publisher: Publisher,
    control_center: ControlCenter,
    sys_spec: SysSpecTable,
}

impl DistributedHardwareService {
    pub fn new(executor: TaskExecutor, sys_spec: SysSpecTable) -> Self {
        Self {
            executor,
            publisher: Publisher::new(),
            control_center: ControlCenter::new(),
            sys_spec,
        }
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn engine(&self, engine_id: i32) -> Option<EngineInfo> {
        self.control_center.engine(engine_id)
    }

    // ------------------------------------------------------------------
    // Local policy triggers
    // ------------------------------------------------------------------

    pub fn enable_hardware(&self, unit: HardwareUnit) -> Result<TaskHandle> {
        self.executor.submit_new(TaskType::Enable, unit)
    }

    pub fn disable_hardware(&self, unit: HardwareUnit) -> Result<TaskHandle> {
        self.executor.submit_new(TaskType::Disable, unit)
    }

    /// A device joined: remember what it advertises, then enable it all
    pub fn device_online(
        &self,
        network_id: &str,
        device_id: &str,
        capabilities: Vec<(String, DhType)>,
    ) -> Result<TaskHandle> {
        let unit = HardwareUnit::device(network_id, device_id);
        unit.validate(true)?;
        if let Some((dh_id, _)) = capabilities.iter().find(|(dh_id, _)| dh_id.trim().is_empty()) {
            return Err(AppError::Validation(format!("capability id {:?} is empty", dh_id)));
        }

        let store = self.executor.capabilities();
        let count = capabilities.len();
        for (dh_id, dh_type) in capabilities {
            store.insert(Capability::new(device_id, dh_id, dh_type));
        }
        info!(device = %anonymize(device_id), count, "Device online");
        self.executor.submit_new(TaskType::Online, unit)
    }

    /// A device left: disable what was enabled, forget it, tell listeners
    pub fn device_offline(&self, network_id: &str, device_id: &str) -> Result<TaskHandle> {
        let handle = self
            .executor
            .submit_new(TaskType::Offline, HardwareUnit::device(network_id, device_id))?;
        info!(device = %anonymize(device_id), "Device offline");

        let message = serde_json::json!({ "network_id": network_id, "device_id": device_id });
        if let Err(e) = self.publisher.publish(DhTopic::DevOffline, &message.to_string()) {
            warn!(error = %e, "Failed to publish device offline");
        }
        Ok(handle)
    }

    pub fn task_dump(&self) -> Vec<TaskDump> {
        self.executor.board().dump()
    }

    pub fn enabled_units(&self) -> Vec<HardwareUnit> {
        self.executor.board().enabled_units()
    }
}

impl DistributedHardware for DistributedHardwareService {
    fn register_publisher_listener(
        &self,
        topic: DhTopic,
        listener: Arc<dyn PublisherListener>,
    ) -> Result<()> {
        self.publisher.register(topic, listener);
        Ok(())
    }

    fn unregister_publisher_listener(
        &self,
        topic: DhTopic,
        listener: Arc<dyn PublisherListener>,
    ) -> Result<()> {
        self.publisher.unregister(topic, listener.listener_id())
    }

    fn publish_message(&self, topic: DhTopic, message: &str) -> Result<()> {
        self.publisher.publish(topic, message).map(|_| ())
    }

    fn query_local_sys_spec(&self, spec: LocalSysSpec) -> Result<String> {
        self.sys_spec.to_json(spec)
    }

    fn initialize(&self, role: TransRole) -> Result<i32> {
        Ok(self.control_center.initialize(role))
    }

    fn release(&self, engine_id: i32) -> Result<()> {
        self.control_center.release(engine_id)
    }

    fn create_control_channel(&self, engine_id: i32, peer_dev_id: &str) -> Result<()> {
        self.control_center.create_control_channel(engine_id, peer_dev_id)
    }

    fn notify(&self, engine_id: i32, event: AvTransEvent) -> Result<Option<TaskId>> {
        self.control_center.ensure_engine(engine_id)?;

        let task_type = match event.event_type {
            AvTransEventType::HardwareEnable => TaskType::Enable,
            AvTransEventType::HardwareDisable => TaskType::Disable,
            _ => {
                self.control_center.notify(engine_id, &event)?;
                return Ok(None);
            }
        };
        // Only an accepted event is recorded on the engine
        let unit: HardwareUnit = serde_json::from_str(&event.content)?;
        let handle = self.executor.submit_new(task_type, unit)?;
        info!(
            engine_id,
            task_id = %handle.id(),
            peer = %anonymize(&event.peer_dev_id),
            "Hardware task requested by peer"
        );
        if let Err(e) = self.control_center.notify(engine_id, &event) {
            warn!(engine_id, error = %e, "Engine released while its event was handled");
        }
        Ok(Some(handle.id().clone()))
    }

    fn register_control_center_callback(&self, engine_id: i32, callback_id: &str) -> Result<()> {
        self.control_center.register_callback(engine_id, callback_id)
    }
}
