// Distributed Hardware Service Port
// The operations reachable through the remote dispatch stub. Every call is
// synchronous and must return without waiting on hardware I/O; anything slow
// is handed to a task.

use std::sync::Arc;

use crate::domain::{AvTransEvent, DhTopic, LocalSysSpec, TaskId, TransRole};
use crate::error::Result;

/// Receiver of messages published on a topic
pub trait PublisherListener: Send + Sync {
    /// Identity used to match register/unregister calls
    fn listener_id(&self) -> &str;

    fn on_message(&self, topic: DhTopic, message: &str);
}

/// Service operations behind the dispatch stub
pub trait DistributedHardware: Send + Sync {
    fn register_publisher_listener(
        &self,
        topic: DhTopic,
        listener: Arc<dyn PublisherListener>,
    ) -> Result<()>;

    fn unregister_publisher_listener(
        &self,
        topic: DhTopic,
        listener: Arc<dyn PublisherListener>,
    ) -> Result<()>;

    fn publish_message(&self, topic: DhTopic, message: &str) -> Result<()>;

    /// JSON description of the requested local specification
    fn query_local_sys_spec(&self, spec: LocalSysSpec) -> Result<String>;

    /// Create an AV engine and return its id
    fn initialize(&self, role: TransRole) -> Result<i32>;

    fn release(&self, engine_id: i32) -> Result<()>;

    fn create_control_channel(&self, engine_id: i32, peer_dev_id: &str) -> Result<()>;

    /// Deliver an event to an engine. Hardware enable/disable events submit a
    /// task and return its id without waiting for it.
    fn notify(&self, engine_id: i32, event: AvTransEvent) -> Result<Option<TaskId>>;

    fn register_control_center_callback(&self, engine_id: i32, callback_id: &str) -> Result<()>;
}
