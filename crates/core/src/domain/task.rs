// Task Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::error::{DomainError, Result};
use crate::domain::hardware::HardwareUnit;

/// Task ID (UUID v4 in production)
pub type TaskId = String;

/// Lifecycle operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Enable,
    Disable,
    Online,
    Offline,
}

impl TaskType {
    /// Ordered sub-steps of this kind of task
    pub fn steps(&self) -> Vec<TaskStep> {
        match self {
            TaskType::Enable => vec![TaskStep::DoEnable],
            TaskType::Disable => vec![TaskStep::DoDisable],
            TaskType::Online => vec![TaskStep::SyncOnlineInfo, TaskStep::RegisterOnlineHardware],
            TaskType::Offline => vec![
                TaskStep::UnregisterOfflineHardware,
                TaskStep::WaitUnregisterComplete,
                TaskStep::ClearOfflineInfo,
            ],
        }
    }

    /// Online/offline address a whole device, not one hardware instance
    pub fn is_device_level(&self) -> bool {
        matches!(self, TaskType::Online | TaskType::Offline)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Enable => write!(f, "ENABLE"),
            TaskType::Disable => write!(f, "DISABLE"),
            TaskType::Online => write!(f, "ON_LINE"),
            TaskType::Offline => write!(f, "OFF_LINE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStep {
    DoEnable,
    DoDisable,
    SyncOnlineInfo,
    RegisterOnlineHardware,
    UnregisterOfflineHardware,
    WaitUnregisterComplete,
    ClearOfflineInfo,
}

/// Task State: INIT -> RUNNING -> {SUCCESS, FAIL}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Init,
    Running,
    Success,
    Fail,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Fail)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Init => write!(f, "INIT"),
            TaskState::Running => write!(f, "RUNNING"),
            TaskState::Success => write!(f, "SUCCESS"),
            TaskState::Fail => write!(f, "FAIL"),
        }
    }
}

/// Failure attribution kept on a task that ended in FAIL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub code: i32,
    pub message: String,
}

/// Serializable snapshot used by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDump {
    pub id: TaskId,
    pub task_type: TaskType,
    pub unit: HardwareUnit,
    pub state: TaskState,
    pub steps: Vec<TaskStep>,
    pub parent_id: Option<TaskId>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub outcome: Option<TaskOutcome>,
}

#[derive(Debug)]
struct Progress {
    state: TaskState,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    outcome: Option<TaskOutcome>,
}

/// One lifecycle operation on a hardware unit.
///
/// Identity and addressing are immutable. Only the progress record changes,
/// and only forward: a task never re-enters RUNNING once terminal.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    task_type: TaskType,
    unit: HardwareUnit,
    steps: Vec<TaskStep>,
    parent_id: Option<TaskId>,
    created_at: i64,
    progress: RwLock<Progress>,
}

impl Task {
    /// Create a task in INIT with the step sequence of its type
    ///
    /// # Arguments
    ///
    /// * `id` - Unique task ID (injected, not generated)
    /// * `task_type` - Lifecycle operation
    /// * `unit` - Target hardware unit (device-level for online/offline)
    /// * `parent_id` - Task that spawned this one, if any
    /// * `created_at` - Creation timestamp in epoch ms
    pub fn new(
        id: impl Into<String>,
        task_type: TaskType,
        unit: HardwareUnit,
        parent_id: Option<TaskId>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            task_type,
            steps: task_type.steps(),
            unit,
            parent_id,
            created_at,
            progress: RwLock::new(Progress {
                state: TaskState::Init,
                started_at: None,
                finished_at: None,
                outcome: None,
            }),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn unit(&self) -> &HardwareUnit {
        &self.unit
    }

    pub fn network_id(&self) -> &str {
        &self.unit.network_id
    }

    pub fn device_id(&self) -> &str {
        &self.unit.device_id
    }

    pub fn dh_id(&self) -> &str {
        &self.unit.dh_id
    }

    pub fn steps(&self) -> &[TaskStep] {
        &self.steps
    }

    pub fn parent_id(&self) -> Option<&TaskId> {
        self.parent_id.as_ref()
    }

    pub fn state(&self) -> TaskState {
        self.read().state
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.read().outcome.clone()
    }

    /// Transition INIT -> RUNNING
    pub fn start(&self, now_millis: i64) -> Result<()> {
        let mut progress = self.write();
        if progress.state != TaskState::Init {
            return Err(invalid(progress.state, TaskState::Running));
        }
        progress.state = TaskState::Running;
        progress.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition RUNNING -> SUCCESS
    pub fn succeed(&self, now_millis: i64) -> Result<()> {
        let mut progress = self.write();
        if progress.state != TaskState::Running {
            return Err(invalid(progress.state, TaskState::Success));
        }
        progress.state = TaskState::Success;
        progress.finished_at = Some(now_millis);
        Ok(())
    }

    /// Transition RUNNING -> FAIL, keeping the failure attribution
    pub fn fail(&self, now_millis: i64, outcome: TaskOutcome) -> Result<()> {
        let mut progress = self.write();
        if progress.state != TaskState::Running {
            return Err(invalid(progress.state, TaskState::Fail));
        }
        progress.state = TaskState::Fail;
        progress.finished_at = Some(now_millis);
        progress.outcome = Some(outcome);
        Ok(())
    }

    /// Force a RUNNING task to FAIL regardless of its steps. Returns false
    /// when the task is not RUNNING; an INIT task must be started first so
    /// that no path skips RUNNING.
    pub fn abort(&self, now_millis: i64, outcome: TaskOutcome) -> bool {
        let mut progress = self.write();
        if progress.state != TaskState::Running {
            return false;
        }
        progress.state = TaskState::Fail;
        progress.finished_at = Some(now_millis);
        progress.outcome = Some(outcome);
        true
    }

    pub fn dump(&self) -> TaskDump {
        let progress = self.read();
        TaskDump {
            id: self.id.clone(),
            task_type: self.task_type,
            unit: self.unit.clone(),
            state: progress.state,
            steps: self.steps.clone(),
            parent_id: self.parent_id.clone(),
            created_at: self.created_at,
            started_at: progress.started_at,
            finished_at: progress.finished_at,
            outcome: progress.outcome.clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Progress> {
        self.progress.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Progress> {
        self.progress.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn invalid(from: TaskState, to: TaskState) -> DomainError {
    DomainError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}
