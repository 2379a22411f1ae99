// Task bodies - what each step of each task kind actually does
//
// A task's steps run in order on the executing context; the first step that
// fails decides the task's outcome and the remaining steps are skipped.

pub mod factory;

pub use factory::TaskFactory;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::application::executor::constants::OFFLINE_SETTLE_TIMEOUT;
use crate::application::executor::{TaskExecutor, TaskHandle};
use crate::application::retry::RetryDecision;
use crate::domain::{anonymize, Capability, HardwareUnit, Task, TaskOutcome, TaskState, TaskStep, TaskType};
use crate::error::{code, AppError};

/// State carried from one step to the next within a single run
#[derive(Default)]
struct StepState {
    capabilities: Vec<Capability>,
    children: Vec<TaskHandle>,
}

/// Run every step of `task`; `Err` carries the failure attribution
pub(crate) async fn run_steps(executor: &TaskExecutor, task: &Arc<Task>) -> Result<(), TaskOutcome> {
    let mut state = StepState::default();
    for step in task.steps() {
        debug!(task_id = %task.id(), step = ?step, "Running step");
        match step {
            TaskStep::DoEnable | TaskStep::DoDisable => register_hardware(executor, task).await?,
            TaskStep::SyncOnlineInfo => sync_online_info(executor, task, &mut state)?,
            TaskStep::RegisterOnlineHardware => register_online_hardware(executor, task, &state)?,
            TaskStep::UnregisterOfflineHardware => {
                unregister_offline_hardware(executor, task, &mut state).await?
            }
            TaskStep::WaitUnregisterComplete => wait_unregister_complete(task, &mut state).await,
            TaskStep::ClearOfflineInfo => clear_offline_info(executor, task),
        }
    }
    Ok(())
}

/// Enable or disable the task's unit through the component manager,
/// retrying per policy. SUCCESS is recorded in the enabled-unit ledger.
async fn register_hardware(executor: &TaskExecutor, task: &Task) -> Result<(), TaskOutcome> {
    let manager = executor.component_manager();
    let unit = task.unit();
    let mut attempt = 1;
    loop {
        let result = match task.task_type() {
            TaskType::Enable => manager.enable(unit).await,
            TaskType::Disable => manager.disable(unit).await,
            other => {
                return Err(outcome(
                    code::INTERNAL_ERROR,
                    format!("{} task has no hardware step", other),
                ))
            }
        };

        let err = match result {
            Ok(()) => {
                let board = executor.board();
                if task.task_type() == TaskType::Enable {
                    // The device may have gone offline while the handler ran
                    if executor.capabilities().dh_type(&unit.device_id, &unit.dh_id).is_none() {
                        warn!(task_id = %task.id(), "Enabled hardware is no longer known, not recorded");
                        return Ok(());
                    }
                    board.save_enabled_unit(unit);
                } else {
                    board.remove_enabled_unit(unit);
                }
                return Ok(());
            }
            Err(e) => e,
        };

        match executor.retry_policy().should_retry(task.id(), attempt, &err) {
            RetryDecision::Retry(delay_ms) => {
                tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
                attempt += 1;
            }
            RetryDecision::Failed => return Err(outcome(err.code(), err.to_string())),
        }
    }
}

fn sync_online_info(
    executor: &TaskExecutor,
    task: &Task,
    state: &mut StepState,
) -> Result<(), TaskOutcome> {
    state.capabilities = executor.capabilities().capabilities(task.device_id());
    if state.capabilities.is_empty() {
        return Err(outcome(
            code::NOT_FOUND,
            format!("device {} advertised no hardware", anonymize(task.device_id())),
        ));
    }
    info!(
        task_id = %task.id(),
        device = %anonymize(task.device_id()),
        count = state.capabilities.len(),
        "Online info synced"
    );
    Ok(())
}

/// Submit one Enable child per capability. Children run on their own and the
/// online task does not wait for them.
fn register_online_hardware(
    executor: &TaskExecutor,
    task: &Task,
    state: &StepState,
) -> Result<(), TaskOutcome> {
    for capability in &state.capabilities {
        let unit = HardwareUnit::new(task.network_id(), task.device_id(), capability.dh_id.clone());
        match submit_child(executor, task, TaskType::Enable, unit) {
            Ok(Some(handle)) => drop(handle),
            Ok(None) => {}
            Err(e) => return Err(outcome(e.code(), e.to_string())),
        }
    }
    Ok(())
}

/// Submit one Disable child per enabled unit of the device. Enable tasks
/// still running for the device (e.g. children of its online task) are
/// waited for first, so the ledger read below includes what they enable.
async fn unregister_offline_hardware(
    executor: &TaskExecutor,
    task: &Task,
    state: &mut StepState,
) -> Result<(), TaskOutcome> {
    if let Err(e) = executor
        .board()
        .wait_for_device_tasks(task.device_id(), OFFLINE_SETTLE_TIMEOUT)
        .await
    {
        warn!(task_id = %task.id(), error = %e, "Offline proceeds with hardware tasks in flight");
    }

    let units: Vec<HardwareUnit> = executor
        .board()
        .enabled_units()
        .into_iter()
        .filter(|u| u.device_id == task.device_id())
        .collect();

    for unit in units {
        let unit = HardwareUnit::new(task.network_id(), unit.device_id, unit.dh_id);
        match submit_child(executor, task, TaskType::Disable, unit) {
            Ok(Some(handle)) => state.children.push(handle),
            Ok(None) => {}
            Err(e) => return Err(outcome(e.code(), e.to_string())),
        }
    }
    Ok(())
}

/// Wait for the Disable children. A failed child is logged; the device is
/// leaving either way, so the offline task carries on with cleanup.
async fn wait_unregister_complete(task: &Task, state: &mut StepState) {
    let children = std::mem::take(&mut state.children);
    let total = children.len();
    let states = join_all(children.into_iter().map(TaskHandle::wait)).await;
    let failed = states.iter().filter(|s| **s != TaskState::Success).count();
    if failed > 0 {
        warn!(task_id = %task.id(), failed, total, "Some hardware failed to disable");
    } else {
        debug!(task_id = %task.id(), total, "All hardware disabled");
    }
}

fn clear_offline_info(executor: &TaskExecutor, task: &Task) {
    let dropped = executor.capabilities().remove_device(task.device_id());
    let stale = executor.board().remove_enabled_device(task.device_id());
    info!(
        task_id = %task.id(),
        device = %anonymize(task.device_id()),
        capabilities = dropped,
        stale_units = stale,
        "Offline info cleared"
    );
}

/// Create and submit a child task. `Ok(None)` means the same operation is
/// already in flight for the unit, which is as good as submitting it.
fn submit_child(
    executor: &TaskExecutor,
    parent: &Task,
    task_type: TaskType,
    unit: HardwareUnit,
) -> crate::error::Result<Option<TaskHandle>> {
    let child = executor
        .factory()
        .create(task_type, unit, Some(parent.id().clone()))?;
    match executor.submit(child) {
        Ok(handle) => Ok(Some(handle)),
        Err(AppError::Conflict(msg)) => {
            debug!(task_id = %parent.id(), reason = %msg, "Child task skipped");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn outcome(code: i32, message: impl Into<String>) -> TaskOutcome {
    TaskOutcome {
        code,
        message: message.into(),
    }
}
