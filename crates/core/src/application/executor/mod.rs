// Task Executor - runs each submitted task exactly once on its own context

pub mod constants;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::application::component_manager::ComponentManager;
use crate::application::retry::RetryPolicy;
use crate::application::task::{run_steps, TaskFactory};
use crate::application::task_board::TaskBoard;
use crate::domain::{HardwareUnit, Task, TaskId, TaskOutcome, TaskState, TaskType};
use crate::error::{code, AppError, Result};
use crate::port::{CapabilityStore, TimeProvider};
use constants::DEFAULT_MAX_CONCURRENT_TASKS;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on enable/disable tasks running at once. Online/offline
    /// tasks only spawn and wait for children, so they are not counted.
    pub max_concurrent_tasks: usize,
    /// Reject a task when one of the same kind is already in flight for the
    /// same unit
    pub dedupe_in_flight: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            dedupe_in_flight: false,
        }
    }
}

/// Collaborators shared by every task run
pub struct TaskContext {
    pub manager: Arc<ComponentManager>,
    pub board: Arc<TaskBoard>,
    pub capabilities: Arc<dyn CapabilityStore>,
    pub factory: Arc<TaskFactory>,
    pub retry: RetryPolicy,
    pub time: Arc<dyn TimeProvider>,
}

struct Inner {
    ctx: TaskContext,
    permits: Arc<Semaphore>,
    accepting: AtomicBool,
    dedupe_in_flight: bool,
}

/// Cheap to clone; all clones share one board and one permit pool.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<Inner>,
}

/// Completion handle of a submitted task. Dropping it does not cancel the
/// task.
pub struct TaskHandle {
    task: Arc<Task>,
    join: JoinHandle<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        self.task.id()
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// Wait for the terminal state
    pub async fn wait(self) -> TaskState {
        match self.join.await {
            Ok(state) => state,
            Err(e) => {
                warn!(task_id = %self.task.id(), error = %e, "Task runner did not complete");
                self.task.state()
            }
        }
    }
}

impl TaskExecutor {
    pub fn new(ctx: TaskContext, config: ExecutorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                permits: Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1))),
                accepting: AtomicBool::new(true),
                dedupe_in_flight: config.dedupe_in_flight,
            }),
        }
    }

    pub fn board(&self) -> &Arc<TaskBoard> {
        &self.inner.ctx.board
    }

    pub fn component_manager(&self) -> &Arc<ComponentManager> {
        &self.inner.ctx.manager
    }

    pub fn capabilities(&self) -> &Arc<dyn CapabilityStore> {
        &self.inner.ctx.capabilities
    }

    pub fn factory(&self) -> &Arc<TaskFactory> {
        &self.inner.ctx.factory
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.ctx.retry
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Create a task through the factory and submit it
    pub fn submit_new(&self, task_type: TaskType, unit: HardwareUnit) -> Result<TaskHandle> {
        let task = self.factory().create(task_type, unit, None)?;
        self.submit(task)
    }

    /// Register an INIT task on the board and start it.
    ///
    /// Returns as soon as the task is spawned; the caller never waits on
    /// hardware. Must be called from within a tokio runtime.
    pub fn submit(&self, task: Arc<Task>) -> Result<TaskHandle> {
        if !self.is_accepting() {
            return Err(AppError::InvalidState("executor is shutting down".into()));
        }
        if task.state() != TaskState::Init {
            return Err(AppError::InvalidState(format!(
                "task {} is {}, only INIT tasks can be submitted",
                task.id(),
                task.state()
            )));
        }

        if self.inner.dedupe_in_flight {
            self.board().add_task_exclusive(Arc::clone(&task))?;
        } else {
            self.board().add_task(Arc::clone(&task))?;
        }

        info!(
            task_id = %task.id(),
            task_type = %task.task_type(),
            unit = %task.unit(),
            "Task submitted"
        );

        let join = tokio::spawn(self.clone().run(Arc::clone(&task)));
        Ok(TaskHandle { task, join })
    }

    /// Stop accepting new tasks. Tasks already on the board keep running.
    pub fn shutdown(&self) {
        if self.inner.accepting.swap(false, Ordering::SeqCst) {
            info!(in_flight = self.board().len(), "Executor stopped accepting tasks");
        }
    }

    /// Wait until every in-flight task has left the board
    pub async fn drain(&self, timeout: Duration) -> Result<()> {
        self.board().wait_for_all_tasks_finish(timeout).await
    }

    /// Runner: owns the task for the duration of the run and always removes
    /// it from the board, after its terminal state is visible.
    async fn run(self, task: Arc<Task>) -> TaskState {
        let _permit = match self.acquire(&task).await {
            Ok(permit) => permit,
            Err(e) => {
                self.abort(&task, code::INTERNAL_ERROR, e.to_string());
                self.board().remove_task(task.id());
                return task.state();
            }
        };

        let span = info_span!(
            "task",
            task_id = %task.id(),
            task_type = %task.task_type()
        );
        // Inner spawn isolates panics in handlers from the runner
        let body = {
            let executor = self.clone();
            let task = Arc::clone(&task);
            tokio::spawn(async move { executor.do_task(&task).await }.instrument(span))
        };

        if let Err(join_err) = body.await {
            let message = if join_err.is_panic() {
                error!(task_id = %task.id(), "Task panicked: {:?}", join_err);
                "task body panicked".to_string()
            } else {
                error!(task_id = %task.id(), "Task cancelled: {:?}", join_err);
                "task body cancelled".to_string()
            };
            self.abort(&task, code::INTERNAL_ERROR, message);
        }

        self.board().remove_task(task.id());
        task.state()
    }

    async fn acquire(&self, task: &Task) -> Result<Option<OwnedSemaphorePermit>> {
        if task.task_type().is_device_level() {
            return Ok(None);
        }
        Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map(Some)
            .map_err(|e| AppError::Internal(format!("task permits closed: {}", e)))
    }

    /// INIT -> RUNNING -> {SUCCESS, FAIL}
    async fn do_task(&self, task: &Arc<Task>) {
        let time = &self.inner.ctx.time;
        if let Err(e) = task.start(time.now_millis()) {
            error!(task_id = %task.id(), error = %e, "Task could not start");
            self.abort(task, code::CONFLICT, e.to_string());
            return;
        }
        info!(unit = %task.unit(), "Task running");

        let transition = match run_steps(self, task).await {
            Ok(()) => {
                info!("Task succeeded");
                task.succeed(time.now_millis())
            }
            Err(outcome) => {
                warn!(code = outcome.code, message = %outcome.message, "Task failed");
                task.fail(time.now_millis(), outcome)
            }
        };
        if let Err(e) = transition {
            error!(task_id = %task.id(), error = %e, "Task ended in unexpected state");
        }
    }

    /// Force FAIL, starting the task first if it never left INIT
    fn abort(&self, task: &Task, code: i32, message: String) {
        let now = self.inner.ctx.time.now_millis();
        if task.state() == TaskState::Init {
            let _ = task.start(now);
        }
        if task.abort(now, TaskOutcome { code, message }) {
            warn!(task_id = %task.id(), code, "Task aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Capability, DhType};
    use crate::port::capability_store::mocks::MockCapabilityStore;
    use crate::port::hardware_handler::mocks::{MockBehavior, MockHardwareHandler};
    use crate::port::id_provider::mocks::{FixedIdProvider, SequentialIdProvider};
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::{HardwareHandler, IdProvider};

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        executor: TaskExecutor,
        capabilities: Arc<MockCapabilityStore>,
    }

    fn harness_with(
        handler: MockHardwareHandler,
        ids: Arc<dyn IdProvider>,
        config: ExecutorConfig,
        retry: RetryPolicy,
    ) -> Harness {
        let capabilities = Arc::new(MockCapabilityStore::with(vec![
            Capability::new("dev1", "hw1", DhType::Camera),
            Capability::new("dev1", "hw2", DhType::Camera),
            Capability::new("dev1", "mic", DhType::Audio),
        ]));
        let handler: Arc<dyn HardwareHandler> = Arc::new(handler);
        let manager = ComponentManager::builder(capabilities.clone())
            .register(DhType::Camera, handler)
            .unwrap()
            .build();
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let ctx = TaskContext {
            manager: Arc::new(manager),
            board: Arc::new(TaskBoard::new()),
            capabilities: capabilities.clone(),
            factory: Arc::new(TaskFactory::new(ids, Arc::clone(&time))),
            retry,
            time,
        };
        Harness {
            executor: TaskExecutor::new(ctx, config),
            capabilities,
        }
    }

    fn harness(handler: MockHardwareHandler) -> Harness {
        harness_with(
            handler,
            Arc::new(SequentialIdProvider::new("task")),
            ExecutorConfig::default(),
            RetryPolicy::default(),
        )
    }

    fn hw1() -> HardwareUnit {
        HardwareUnit::new("net1", "dev1", "hw1")
    }

    #[tokio::test]
    async fn test_enable_success_leaves_board() {
        let handler = MockHardwareHandler::new_success();
        let h = harness(handler.clone());

        let handle = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();
        let task = Arc::clone(handle.task());
        assert_eq!(handle.wait().await, TaskState::Success);

        assert_eq!(task.state(), TaskState::Success);
        assert!(h.executor.board().find_task(task.id()).is_none());
        assert!(h.executor.board().is_enabled("dev1", "hw1"));
        assert_eq!(handler.enable_calls(), 1);
    }

    #[tokio::test]
    async fn test_enable_failure_attributes_handler_code() {
        let h = harness(MockHardwareHandler::new_fail(-7));

        let handle = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();
        let task = Arc::clone(handle.task());
        assert_eq!(handle.wait().await, TaskState::Fail);

        assert_eq!(task.outcome().unwrap().code, -7);
        assert!(h.executor.board().is_empty());
        assert!(!h.executor.board().is_enabled("dev1", "hw1"));
    }

    #[tokio::test]
    async fn test_unsupported_type_fails_task() {
        let h = harness(MockHardwareHandler::new_success());

        let handle = h
            .executor
            .submit_new(TaskType::Enable, HardwareUnit::new("net1", "dev1", "mic"))
            .unwrap();
        let task = Arc::clone(handle.task());
        assert_eq!(handle.wait().await, TaskState::Fail);
        assert_eq!(task.outcome().unwrap().code, code::NOT_SUPPORTED);
    }

    #[tokio::test]
    async fn test_disable_clears_ledger() {
        let h = harness(MockHardwareHandler::new_success());
        h.executor.board().save_enabled_unit(&hw1());

        let handle = h.executor.submit_new(TaskType::Disable, hw1()).unwrap();
        assert_eq!(handle.wait().await, TaskState::Success);
        assert!(!h.executor.board().is_enabled("dev1", "hw1"));
    }

    #[tokio::test]
    async fn test_task_submitted_once() {
        let h = harness(MockHardwareHandler::new(MockBehavior::Delay(
            Duration::from_millis(50),
        )));
        let task = h
            .executor
            .factory()
            .create(TaskType::Enable, hw1(), None)
            .unwrap();

        let handle = h.executor.submit(Arc::clone(&task)).unwrap();
        assert!(matches!(
            h.executor.submit(Arc::clone(&task)),
            Err(AppError::Conflict(_))
        ));
        handle.wait().await;
        assert!(matches!(
            h.executor.submit(task),
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let h = harness_with(
            MockHardwareHandler::new(MockBehavior::Delay(Duration::from_millis(50))),
            Arc::new(FixedIdProvider("same".into())),
            ExecutorConfig::default(),
            RetryPolicy::default(),
        );

        let first = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();
        let err = h
            .executor
            .submit_new(TaskType::Enable, HardwareUnit::new("net1", "dev1", "hw2"))
            .err()
            .unwrap();
        assert_eq!(err.code(), code::CONFLICT);
        assert_eq!(first.wait().await, TaskState::Success);
    }

    #[tokio::test]
    async fn test_dedupe_in_flight() {
        let h = harness_with(
            MockHardwareHandler::new(MockBehavior::Delay(Duration::from_millis(50))),
            Arc::new(SequentialIdProvider::new("task")),
            ExecutorConfig {
                dedupe_in_flight: true,
                ..ExecutorConfig::default()
            },
            RetryPolicy::default(),
        );

        let first = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();
        assert!(matches!(
            h.executor.submit_new(TaskType::Enable, hw1()),
            Err(AppError::Conflict(_))
        ));
        // a different operation on the same unit is not a duplicate
        let disable = h.executor.submit_new(TaskType::Disable, hw1()).unwrap();
        first.wait().await;
        disable.wait().await;
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let h = harness(MockHardwareHandler::new(MockBehavior::Panic(
            "driver exploded".into(),
        )));

        let handle = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();
        let task = Arc::clone(handle.task());
        assert_eq!(handle.wait().await, TaskState::Fail);
        assert_eq!(task.outcome().unwrap().code, code::INTERNAL_ERROR);
        assert!(h.executor.board().is_empty());
    }

    #[tokio::test]
    async fn test_retry_recovers_listed_code() {
        let handler = MockHardwareHandler::new(MockBehavior::FailTimes(2, -16));
        let h = harness_with(
            handler.clone(),
            Arc::new(SequentialIdProvider::new("task")),
            ExecutorConfig::default(),
            RetryPolicy::new(3, 1, 1.0, vec![-16]),
        );

        let handle = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();
        assert_eq!(handle.wait().await, TaskState::Success);
        assert_eq!(handler.enable_calls(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_distinct_tasks_all_finish() {
        let h = harness_with(
            MockHardwareHandler::new(MockBehavior::Delay(Duration::from_millis(5))),
            Arc::new(SequentialIdProvider::new("task")),
            ExecutorConfig {
                max_concurrent_tasks: 4,
                ..ExecutorConfig::default()
            },
            RetryPolicy::default(),
        );
        for i in 0..32 {
            h.capabilities
                .insert(Capability::new("dev1", format!("cam{}", i), DhType::Camera));
        }

        let handles: Vec<TaskHandle> = (0..32)
            .map(|i| {
                h.executor
                    .submit_new(
                        TaskType::Enable,
                        HardwareUnit::new("net1", "dev1", format!("cam{}", i)),
                    )
                    .unwrap()
            })
            .collect();
        let tasks: Vec<Arc<Task>> = handles.iter().map(|h| Arc::clone(h.task())).collect();

        h.executor.drain(WAIT).await.unwrap();
        assert!(h.executor.board().is_empty());
        assert!(tasks.iter().all(|t| t.state().is_terminal()));
        assert_eq!(h.executor.board().enabled_units().len(), 32);
    }

    #[tokio::test]
    async fn test_online_enables_every_capability() {
        let handler = MockHardwareHandler::new_success();
        let h = harness(handler.clone());

        let online = h
            .executor
            .submit_new(TaskType::Online, HardwareUnit::device("net1", "dev1"))
            .unwrap();
        assert_eq!(online.wait().await, TaskState::Success);
        h.executor.drain(WAIT).await.unwrap();

        // hw1 and hw2 are cameras; the audio unit has no handler
        assert_eq!(handler.enable_calls(), 2);
        assert!(h.executor.board().is_enabled("dev1", "hw1"));
        assert!(h.executor.board().is_enabled("dev1", "hw2"));
        assert!(!h.executor.board().is_enabled("dev1", "mic"));
    }

    #[tokio::test]
    async fn test_online_unknown_device_fails() {
        let h = harness(MockHardwareHandler::new_success());
        let online = h
            .executor
            .submit_new(TaskType::Online, HardwareUnit::device("net9", "dev9"))
            .unwrap();
        let task = Arc::clone(online.task());
        assert_eq!(online.wait().await, TaskState::Fail);
        assert_eq!(task.outcome().unwrap().code, code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_offline_disables_then_clears() {
        let handler = MockHardwareHandler::new_success();
        let h = harness(handler.clone());
        h.executor.board().save_enabled_unit(&hw1());
        h.executor
            .board()
            .save_enabled_unit(&HardwareUnit::new("net1", "dev1", "hw2"));

        let offline = h
            .executor
            .submit_new(TaskType::Offline, HardwareUnit::device("net1", "dev1"))
            .unwrap();
        assert_eq!(offline.wait().await, TaskState::Success);

        assert_eq!(handler.disable_calls(), 2);
        assert!(h.executor.board().enabled_units().is_empty());
        assert!(h.capabilities.capabilities("dev1").is_empty());
        assert!(h.executor.board().is_empty());
    }

    #[tokio::test]
    async fn test_offline_right_after_online_disables_late_enables() {
        let handler = MockHardwareHandler::new(MockBehavior::Delay(Duration::from_millis(200)));
        let h = harness(handler.clone());

        let online = h
            .executor
            .submit_new(TaskType::Online, HardwareUnit::device("net1", "dev1"))
            .unwrap();
        assert_eq!(online.wait().await, TaskState::Success);
        // Enable children for hw1/hw2 are still running
        assert!(h.executor.board().enabled_units().is_empty());

        let offline = h
            .executor
            .submit_new(TaskType::Offline, HardwareUnit::device("net1", "dev1"))
            .unwrap();
        assert_eq!(offline.wait().await, TaskState::Success);
        h.executor.drain(WAIT).await.unwrap();

        assert_eq!(handler.enable_calls(), 2);
        assert_eq!(handler.disable_calls(), 2);
        assert!(h.executor.board().enabled_units().is_empty());
        assert!(h.capabilities.capabilities("dev1").is_empty());
    }

    #[tokio::test]
    async fn test_enable_of_forgotten_device_is_not_recorded() {
        let h = harness(MockHardwareHandler::new(MockBehavior::Delay(
            Duration::from_millis(100),
        )));

        let handle = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.capabilities.remove_device("dev1");

        assert_eq!(handle.wait().await, TaskState::Success);
        assert!(!h.executor.board().is_enabled("dev1", "hw1"));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_tasks() {
        let h = harness(MockHardwareHandler::new(MockBehavior::Delay(
            Duration::from_millis(20),
        )));
        let running = h.executor.submit_new(TaskType::Enable, hw1()).unwrap();

        h.executor.shutdown();
        let err = h.executor.submit_new(TaskType::Enable, hw1()).err().unwrap();
        assert!(matches!(err, AppError::InvalidState(_)));

        h.executor.drain(WAIT).await.unwrap();
        assert_eq!(running.wait().await, TaskState::Success);
    }
}
