//! TaskBoard - registry of in-flight tasks
//!
//! Tasks are added from request-handling contexts and removed from
//! task-execution contexts concurrently. Every operation takes the board
//! lock for the duration of the call only, so each one is linearizable.
//! The board also keeps the ledger of enabled hardware units, which is the
//! post-condition the data plane reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::error::Elapsed;
use tracing::{debug, error, info};

use crate::domain::{anonymize, HardwareUnit, Task, TaskDump, TaskId};
use crate::error::{AppError, Result};

#[derive(Default)]
pub struct TaskBoard {
    tasks: Mutex<HashMap<TaskId, Arc<Task>>>,
    enabled: Mutex<HashMap<String, HardwareUnit>>,
    /// Signalled on every removal
    removed: Notify,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task under its id.
    ///
    /// Ids are unique by construction, so a collision is a defect: it is
    /// logged and rejected, never overwritten.
    pub fn add_task(&self, task: Arc<Task>) -> Result<()> {
        let mut tasks = self.tasks();
        if tasks.contains_key(task.id()) {
            error!(task_id = %task.id(), "Duplicate task id, rejecting");
            return Err(AppError::Conflict(format!("task {} already on board", task.id())));
        }
        debug!(task_id = %task.id(), task_type = %task.task_type(), "Task added to board");
        tasks.insert(task.id().clone(), task);
        Ok(())
    }

    /// Insert a task unless another task of the same type already targets the
    /// same unit. The check and the insert happen under one lock.
    pub fn add_task_exclusive(&self, task: Arc<Task>) -> Result<()> {
        let mut tasks = self.tasks();
        if let Some(existing) = tasks
            .values()
            .find(|t| t.task_type() == task.task_type() && t.unit() == task.unit())
        {
            info!(
                task_id = %task.id(),
                existing_id = %existing.id(),
                unit = %task.unit(),
                "Same operation already in flight for unit"
            );
            return Err(AppError::Conflict(format!(
                "{} task {} already in flight for {}",
                existing.task_type(),
                existing.id(),
                task.unit()
            )));
        }
        if tasks.contains_key(task.id()) {
            error!(task_id = %task.id(), "Duplicate task id, rejecting");
            return Err(AppError::Conflict(format!("task {} already on board", task.id())));
        }
        tasks.insert(task.id().clone(), task);
        Ok(())
    }

    /// Remove a task. Absent ids are a no-op so that concurrent removers
    /// never fault.
    pub fn remove_task(&self, id: &str) -> Option<Arc<Task>> {
        let removed = self.tasks().remove(id);
        if removed.is_some() {
            debug!(task_id = %id, "Task removed from board");
            self.removed.notify_waiters();
        }
        removed
    }

    pub fn find_task(&self, id: &str) -> Option<Arc<Task>> {
        self.tasks().get(id).cloned()
    }

    /// Snapshot for status queries, ordered by creation
    pub fn dump(&self) -> Vec<TaskDump> {
        let mut dumps: Vec<TaskDump> = self.tasks().values().map(|t| t.dump()).collect();
        dumps.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        dumps
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    pub fn is_all_task_finish(&self) -> bool {
        self.is_empty()
    }

    /// Wait until the board drains
    pub async fn wait_for_all_tasks_finish(&self, timeout: Duration) -> Result<()> {
        self.wait_until(timeout, |tasks| tasks.is_empty())
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "{} task(s) still in flight after {}ms",
                    self.len(),
                    timeout.as_millis()
                ))
            })
    }

    /// Wait until no enable/disable task for the device is in flight
    pub async fn wait_for_device_tasks(&self, device_id: &str, timeout: Duration) -> Result<()> {
        self.wait_until(timeout, |tasks| {
            !tasks
                .values()
                .any(|t| t.device_id() == device_id && !t.task_type().is_device_level())
        })
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "hardware tasks of device {} still in flight after {}ms",
                anonymize(device_id),
                timeout.as_millis()
            ))
        })
    }

    async fn wait_until<F>(&self, timeout: Duration, done: F) -> std::result::Result<(), Elapsed>
    where
        F: Fn(&HashMap<TaskId, Arc<Task>>) -> bool,
    {
        let wait = async {
            loop {
                let notified = self.removed.notified();
                tokio::pin!(notified);
                // registered before the check so a removal in between is not missed
                notified.as_mut().enable();
                let finished = done(&*self.tasks());
                if finished {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await
    }

    // ------------------------------------------------------------------
    // Enabled-unit ledger
    // ------------------------------------------------------------------

    pub fn save_enabled_unit(&self, unit: &HardwareUnit) {
        self.enabled().insert(unit.ledger_key(), unit.clone());
    }

    pub fn remove_enabled_unit(&self, unit: &HardwareUnit) -> bool {
        self.enabled().remove(&unit.ledger_key()).is_some()
    }

    /// Forget every enabled unit of a device that left the network
    pub fn remove_enabled_device(&self, device_id: &str) -> usize {
        let mut enabled = self.enabled();
        let before = enabled.len();
        enabled.retain(|_, unit| unit.device_id != device_id);
        before - enabled.len()
    }

    pub fn is_enabled(&self, device_id: &str, dh_id: &str) -> bool {
        self.enabled().contains_key(&format!("{}#{}", device_id, dh_id))
    }

    pub fn enabled_units(&self) -> Vec<HardwareUnit> {
        let mut units: Vec<HardwareUnit> = self.enabled().values().cloned().collect();
        units.sort_by(|a, b| (&a.device_id, &a.dh_id).cmp(&(&b.device_id, &b.dh_id)));
        units
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, Arc<Task>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enabled(&self) -> MutexGuard<'_, HashMap<String, HardwareUnit>> {
        self.enabled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
