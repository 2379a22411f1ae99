// Task factory - the only place tasks are constructed outside tests
use std::sync::Arc;

use tracing::debug;

use crate::domain::{HardwareUnit, Task, TaskId, TaskType};
use crate::error::Result;
use crate::port::{IdProvider, TimeProvider};

pub struct TaskFactory {
    ids: Arc<dyn IdProvider>,
    time: Arc<dyn TimeProvider>,
}

impl TaskFactory {
    pub fn new(ids: Arc<dyn IdProvider>, time: Arc<dyn TimeProvider>) -> Self {
        Self { ids, time }
    }

    /// Create a task in INIT with a fresh id
    ///
    /// Device-level kinds (online/offline) drop any hardware id they were
    /// given; per-hardware kinds require one.
    pub fn create(
        &self,
        task_type: TaskType,
        unit: HardwareUnit,
        parent_id: Option<TaskId>,
    ) -> Result<Arc<Task>> {
        let unit = if task_type.is_device_level() {
            HardwareUnit::device(unit.network_id, unit.device_id)
        } else {
            unit
        };
        unit.validate(task_type.is_device_level())?;

        let task = Task::new(
            self.ids.generate_id(),
            task_type,
            unit,
            parent_id,
            self.time.now_millis(),
        );
        debug!(
            task_id = %task.id(),
            task_type = %task_type,
            unit = %task.unit(),
            parent_id = ?task.parent_id(),
            "Task created"
        );
        Ok(Arc::new(task))
    }
}
